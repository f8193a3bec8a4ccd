//! Typed HTTP client for the beacon control API.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::consent::ConsentUpdate;
use crate::domain::settings_store::{Settings, SettingsUpdate};
use crate::domain::types::{ConsentView, DaemonHealth, DaemonStatus, GeoIpProviders};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:9870";

pub struct BeaconClient {
    base_url: String,
    http: Client,
}

impl BeaconClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub async fn health(&self) -> Result<DaemonHealth> {
        self.get("/health").await
    }

    pub async fn status(&self) -> Result<DaemonStatus> {
        self.get("/api/v1/telemetry/status").await
    }

    pub async fn start(&self) -> Result<DaemonStatus> {
        self.post("/api/v1/telemetry/start").await
    }

    pub async fn stop(&self) -> Result<DaemonStatus> {
        self.post("/api/v1/telemetry/stop").await
    }

    pub async fn restart(&self) -> Result<DaemonStatus> {
        self.post("/api/v1/telemetry/restart").await
    }

    pub async fn reload(&self) -> Result<DaemonStatus> {
        self.post("/api/v1/telemetry/reload").await
    }

    pub async fn geoip(&self) -> Result<GeoIpProviders> {
        self.get("/api/v1/telemetry/geoip").await
    }

    pub async fn consent(&self) -> Result<ConsentView> {
        self.get("/api/v1/telemetry/consent").await
    }

    pub async fn update_consent(&self, update: &ConsentUpdate) -> Result<ConsentView> {
        self.put("/api/v1/telemetry/consent", update).await
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings> {
        self.put("/api/v1/telemetry/settings", update).await
    }

    // ── Internal helpers ───────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        Self::decode(&url, resp).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;
        Self::decode(&url, resp).await
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .put(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("PUT {}", url))?;
        Self::decode(&url, resp).await
    }

    async fn decode<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if body.is_empty() {
                bail!("{} returned {}", url, status);
            }
            bail!("{} returned {}: {}", url, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("parsing response from {}", url))
    }
}
