use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::rest::{self, AppState};
use crate::collectors::{self, hospital::CountsFile, Collaborators};
use crate::config::Config;
use crate::domain::collector::CollectorRegistry;
use crate::domain::identity::InstallationIdentity;
use crate::domain::settings_store::{SettingsStore, YamlSettingsStore};
use crate::error::ConfigurationError;
use crate::geoip::GeoIpRegistry;
use crate::telemetry::delivery::HttpDelivery;
use crate::telemetry::{self, DaemonParts, ReportingDaemon};

/// Everything built from configuration before the daemon exists.
pub struct Components {
    pub store: Arc<dyn SettingsStore>,
    pub identity: InstallationIdentity,
    pub geoip: Arc<GeoIpRegistry>,
    pub registry: Arc<CollectorRegistry>,
}

pub fn build_components(config: &Config) -> Result<Components> {
    let settings_path = config.settings_path()?;
    let store: Arc<dyn SettingsStore> = Arc::new(
        YamlSettingsStore::open(settings_path.clone())
            .map_err(ConfigurationError::Store)
            .with_context(|| format!("opening {}", settings_path.display()))?,
    );

    let identity_path = config.identity_path()?;
    let identity = InstallationIdentity::load_or_create(&identity_path)
        .map_err(ConfigurationError::Identity)
        .with_context(|| format!("loading {}", identity_path.display()))?;

    let geoip = Arc::new(GeoIpRegistry::from_config(&config.geoip.urls));

    let registry = collectors::default_registry(Collaborators {
        identity: identity.clone(),
        database: Arc::new(config.database.clone()),
        hospital: Arc::new(CountsFile::new(config.counts_path()?)),
        geoip: geoip.clone(),
        settings: store.clone(),
        geoip_timeout_secs: config.geoip.timeout_secs,
    })
    .context("registering collectors")?;

    Ok(Components {
        store,
        identity,
        geoip,
        registry: Arc::new(registry),
    })
}

pub async fn run(config: Config) -> Result<()> {
    // Init tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Beacon daemon starting");

    let components = build_components(&config)?;
    let delivery = HttpDelivery::new(
        &config.telemetry.endpoint,
        Duration::from_secs(config.telemetry.timeout_secs),
    )
    .map_err(|e| ConfigurationError::Delivery(e.to_string()))
    .context("building delivery client")?;
    info!(endpoint = %delivery.endpoint(), "telemetry endpoint configured");

    let store = components.store.clone();
    let daemon = telemetry::instance(|| {
        ReportingDaemon::new(DaemonParts {
            registry: components.registry,
            store: components.store,
            delivery: Arc::new(delivery),
            identity: components.identity,
            geoip: components.geoip,
        })
    })
    .context("initializing reporting daemon")?;

    daemon.start();

    let app = rest::router(AppState {
        daemon: daemon.clone(),
        store,
    })
    .layer(TraceLayer::new_for_http());

    // Bind HTTP listener
    let http_addr = &config.http_addr;
    let listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("binding to {}", http_addr))?;

    info!(addr = %http_addr, "HTTP server listening");

    // Run HTTP server with graceful shutdown
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    daemon.shutdown().await;
    info!("Beacon daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down"); },
        _ = terminate => { info!("Received SIGTERM, shutting down"); },
    }
}
