use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::collector::{Collector, Facts};
use crate::domain::settings_store::SettingsStore;
use crate::error::CollectionError;
use crate::geoip::GeoIpRegistry;

use super::put;

/// Coarse location of the installation via the selected GeoIP provider.
///
/// The provider name is read from the settings store on every collection so
/// a reload picks up a new selection. An unknown provider name yields no
/// facts rather than an error.
pub struct LocationCollector {
    geoip: Arc<GeoIpRegistry>,
    settings: Arc<dyn SettingsStore>,
    timeout: Duration,
}

impl LocationCollector {
    pub fn new(geoip: Arc<GeoIpRegistry>, settings: Arc<dyn SettingsStore>, timeout_secs: u64) -> Self {
        Self {
            geoip,
            settings,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

impl Collector for LocationCollector {
    fn id(&self) -> &str {
        super::LOCATION
    }

    fn description(&self) -> &str {
        "Country, region and city resolved from the public IP address"
    }

    fn keys(&self) -> &[&'static str] {
        &[
            "loc_country_code",
            "loc_country_name",
            "loc_region",
            "loc_city",
            "loc_postal_code",
            "loc_timezone",
        ]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let selected = self
            .settings
            .read_settings()
            .map_err(|e| CollectionError::new(super::LOCATION, e))?
            .geoip_provider;

        let Some(provider) = self.geoip.get(&selected) else {
            warn!(provider = %selected, "selected GeoIP provider is not installed, omitting location");
            return Ok(Facts::new());
        };

        // Built per call: collection runs on the blocking pool, where the
        // blocking client may be created and dropped.
        let http = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| CollectionError::new(super::LOCATION, e))?;

        let location = provider
            .locate(&http)
            .map_err(|e| CollectionError::new(super::LOCATION, e))?;
        debug!(provider = %selected, "resolved location");

        let mut facts = Facts::new();
        put(&mut facts, "loc_country_code", location.country_code);
        put(&mut facts, "loc_country_name", location.country_name);
        put(&mut facts, "loc_region", location.region);
        put(&mut facts, "loc_city", location.city);
        put(&mut facts, "loc_postal_code", location.postal_code);
        put(&mut facts, "loc_timezone", location.timezone);
        Ok(facts)
    }
}
