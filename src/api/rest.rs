use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::domain::consent::{ConsentRecord, ConsentUpdate};
use crate::domain::settings_store::{Settings, SettingsStore, SettingsUpdate};
use crate::domain::types::*;
use crate::error::StoreError;
use crate::telemetry::ReportingDaemon;

/// Shared application state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub daemon: Arc<ReportingDaemon>,
    pub store: Arc<dyn SettingsStore>,
}

type ApiError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/telemetry/status", get(status))
        .route("/api/v1/telemetry/start", post(start))
        .route("/api/v1/telemetry/stop", post(stop))
        .route("/api/v1/telemetry/restart", post(restart))
        .route("/api/v1/telemetry/reload", post(reload))
        .route("/api/v1/telemetry/geoip", get(geoip))
        .route("/api/v1/telemetry/consent", get(consent).put(update_consent))
        .route("/api/v1/telemetry/settings", put(update_settings))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<DaemonHealth> {
    Json(DaemonHealth {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.daemon.uptime_secs(),
        state: state.daemon.state(),
    })
}

async fn status(State(state): State<AppState>) -> Json<DaemonStatus> {
    Json(state.daemon.status())
}

async fn start(State(state): State<AppState>) -> Json<DaemonStatus> {
    state.daemon.start();
    Json(state.daemon.status())
}

async fn stop(State(state): State<AppState>) -> Json<DaemonStatus> {
    state.daemon.stop();
    Json(state.daemon.status())
}

async fn restart(State(state): State<AppState>) -> Json<DaemonStatus> {
    state.daemon.restart();
    Json(state.daemon.status())
}

async fn reload(State(state): State<AppState>) -> Json<DaemonStatus> {
    state.daemon.reload_settings();
    Json(state.daemon.status())
}

async fn geoip(State(state): State<AppState>) -> Json<GeoIpProviders> {
    Json(GeoIpProviders {
        selected: state.daemon.selected_geoip_provider(),
        available: state.daemon.available_geoip_providers(),
    })
}

/// Reads the store directly, so the response reflects writes the daemon
/// has not reloaded yet.
async fn consent(State(state): State<AppState>) -> Result<Json<ConsentView>, ApiError> {
    let record = state.store.read_consent().map_err(store_error)?;
    Ok(Json(consent_view(&state.daemon, record)))
}

async fn update_consent(
    State(state): State<AppState>,
    Json(update): Json<ConsentUpdate>,
) -> Result<Json<ConsentView>, ApiError> {
    let record = state
        .store
        .update_consent(update, Utc::now())
        .map_err(store_error)?;
    info!(
        active = record.is_reporting_active(),
        categories = ?record.enabled_categories(),
        "consent updated"
    );
    state.daemon.reload_settings();
    Ok(Json(consent_view(&state.daemon, record)))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Settings>, ApiError> {
    if let Some(provider) = &update.geoip_provider {
        let available = state.daemon.available_geoip_providers();
        if !available.contains_key(provider) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!(
                    "unknown GeoIP provider '{}'. Available: {}",
                    provider,
                    available.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
    }

    let settings = state.store.update_settings(update).map_err(store_error)?;
    info!(
        interval_secs = settings.interval_secs,
        geoip_provider = %settings.geoip_provider,
        "settings updated"
    );
    state.daemon.reload_settings();
    Ok(Json(settings))
}

fn consent_view(daemon: &ReportingDaemon, consent: ConsentRecord) -> ConsentView {
    let categories = daemon
        .categories()
        .into_iter()
        .map(|c| CategoryInfo {
            enabled: consent.is_category_enabled(&c.code),
            ..c
        })
        .collect();
    ConsentView {
        consent,
        categories,
    }
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Consent(rejected) => (StatusCode::UNPROCESSABLE_ENTITY, rejected.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}
