//! GeoIP provider registry.
//!
//! Maps provider name → base URL for every installed provider. The selected
//! provider name lives in [`Settings`](crate::domain::settings_store::Settings);
//! the LOCATION collector resolves it here on every collection.

pub mod providers;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GeoIpError;

/// Location facts returned by a provider. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub timezone: Option<String>,
}

/// A GeoIP lookup service.
pub trait GeoIpProvider: Send + Sync {
    fn name(&self) -> &str;

    fn base_url(&self) -> &str;

    /// Locate the caller's public address. Blocking; call from a blocking
    /// context only.
    fn locate(&self, http: &reqwest::blocking::Client) -> Result<GeoLocation, GeoIpError>;
}

/// Read-only provider table built once at startup.
#[derive(Clone, Default)]
pub struct GeoIpRegistry {
    providers: BTreeMap<String, Arc<dyn GeoIpProvider>>,
}

impl GeoIpRegistry {
    /// Built-in providers with base URLs overridden from configuration.
    /// Overrides for unknown provider names are ignored.
    pub fn from_config(url_overrides: &HashMap<String, String>) -> Self {
        for name in url_overrides.keys() {
            if !providers::BUILTIN.contains(&name.as_str()) {
                warn!(provider = %name, "ignoring URL override for unknown GeoIP provider");
            }
        }

        let mut registry = Self::default();
        for provider in providers::builtin(url_overrides) {
            registry = registry.with_provider(provider);
        }
        registry
    }

    pub fn with_provider(mut self, provider: Arc<dyn GeoIpProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GeoIpProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Provider name → base URL.
    pub fn available(&self) -> BTreeMap<String, String> {
        self.providers
            .iter()
            .map(|(name, p)| (name.clone(), p.base_url().to_string()))
            .collect()
    }
}
