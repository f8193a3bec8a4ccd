use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::collectors::DatabaseProduct;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_addr: String,
    pub log_level: String,
    /// Directory holding `settings.yaml` and `identity.yaml`.
    pub state_dir: Option<PathBuf>,
    pub telemetry: TelemetryConfig,
    pub geoip: GeoIpConfig,
    pub database: DatabaseProduct,
    pub hospital: HospitalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:9870".to_string(),
            log_level: "info".to_string(),
            state_dir: None,
            telemetry: TelemetryConfig::default(),
            geoip: GeoIpConfig::default(),
            database: DatabaseProduct::default(),
            hospital: HospitalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::telemetry::delivery::DEFAULT_ENDPOINT.to_string(),
            timeout_secs: crate::telemetry::delivery::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    pub timeout_secs: u64,
    /// Provider name → base URL override.
    pub urls: HashMap<String, String>,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            urls: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HospitalConfig {
    /// JSON counts exported by the host application. Defaults to
    /// `<state_dir>/hospital.json`.
    pub counts_file: Option<PathBuf>,
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("beacon").join("config.yaml"))
    }

    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let data_dir =
                    dirs::data_local_dir().context("could not determine data directory")?;
                Ok(data_dir.join("beacon"))
            }
        }
    }

    pub fn settings_path(&self) -> Result<PathBuf> {
        Ok(self.state_dir()?.join("settings.yaml"))
    }

    pub fn identity_path(&self) -> Result<PathBuf> {
        Ok(self.state_dir()?.join("identity.yaml"))
    }

    pub fn counts_path(&self) -> Result<PathBuf> {
        match &self.hospital.counts_file {
            Some(path) => Ok(path.clone()),
            None => Ok(self.state_dir()?.join("hospital.json")),
        }
    }
}

/// Defaults → YAML file → `BEACON_*` environment. A missing file is not an
/// error; `__` in variable names separates nested sections.
pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed("BEACON_").split("__"))
}

pub fn load(path: Option<&str>) -> Result<Config> {
    let path = match path {
        Some(p) => PathBuf::from(p),
        None => Config::path()?,
    };
    figment(&path)
        .extract()
        .with_context(|| format!("loading config from {}", path.display()))
}
