use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collector::Facts;
use super::consent::ConsentRecord;
use super::identity::InstallationIdentity;
use super::settings_store::Settings;

/// Wire document delivered to the remote collector endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub identity: InstallationIdentity,
    pub facts: Facts,
}

/// Lifecycle state of the reporting daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonState {
    Stopped,
    Running,
}

/// Status view exposed to the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub state: DaemonState,
    pub reporting_active: bool,
    pub enabled_categories: Vec<String>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub interval_secs: u64,
    pub geoip_provider: String,
}

impl DaemonStatus {
    pub fn new(state: DaemonState, consent: &ConsentRecord, settings: &Settings) -> Self {
        Self {
            state,
            reporting_active: consent.is_reporting_active(),
            enabled_categories: consent.enabled_categories(),
            last_sent_at: consent.last_sent_at,
            interval_secs: settings.interval_secs,
            geoip_provider: settings.geoip_provider.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonHealth {
    pub version: String,
    pub uptime_secs: u64,
    pub state: DaemonState,
}

/// One registered collector category, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub code: String,
    pub description: String,
    pub enabled: bool,
}

/// Consent record together with the categories it can authorize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentView {
    pub consent: ConsentRecord,
    pub categories: Vec<CategoryInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpProviders {
    pub selected: String,
    pub available: std::collections::BTreeMap<String, String>,
}
