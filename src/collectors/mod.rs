//! Built-in collectors and the default priority table.

pub mod app;
pub mod dbms;
pub mod hardware;
pub mod hospital;
pub mod identity;
pub mod location;
pub mod os;
pub mod time;

use std::sync::Arc;

use crate::domain::collector::{CollectorRegistry, Facts};
use crate::domain::identity::InstallationIdentity;
use crate::domain::settings_store::SettingsStore;
use crate::error::ConfigurationError;
use crate::geoip::GeoIpRegistry;

pub use dbms::{DatabaseInfo, DatabaseProduct};
pub use hospital::{HospitalCounts, HospitalFacts};

pub const IDENTITY: &str = "IDENTITY";
pub const TIME: &str = "TIME";
pub const APP: &str = "APP";
pub const OS: &str = "OS";
pub const HW: &str = "HW";
pub const DBMS: &str = "DBMS";
pub const HOSPITAL: &str = "HOSPITAL";
pub const LOCATION: &str = "LOCATION";

/// Registration priorities, lowest first. Network-bound collectors last.
pub const PRIORITIES: &[(&str, u32)] = &[
    (IDENTITY, 0),
    (TIME, 10),
    (APP, 20),
    (OS, 30),
    (HW, 40),
    (DBMS, 50),
    (HOSPITAL, 60),
    (LOCATION, 70),
];

fn priority(code: &str) -> u32 {
    PRIORITIES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, p)| *p)
        .unwrap_or(u32::MAX)
}

/// Collaborators the built-in collectors read from.
pub struct Collaborators {
    pub identity: InstallationIdentity,
    pub database: Arc<dyn DatabaseInfo>,
    pub hospital: Arc<dyn HospitalFacts>,
    pub geoip: Arc<GeoIpRegistry>,
    pub settings: Arc<dyn SettingsStore>,
    pub geoip_timeout_secs: u64,
}

/// Registry with every built-in collector at its table priority.
pub fn default_registry(c: Collaborators) -> Result<CollectorRegistry, ConfigurationError> {
    CollectorRegistry::builder()
        .register(priority(IDENTITY), identity::IdentityCollector::new(c.identity))
        .register(priority(TIME), time::TimeCollector)
        .register(priority(APP), app::AppCollector::current())
        .register(priority(OS), os::OsCollector)
        .register(priority(HW), hardware::HardwareCollector)
        .register(priority(DBMS), dbms::DbmsCollector::new(c.database))
        .register(priority(HOSPITAL), hospital::HospitalCollector::new(c.hospital))
        .register(
            priority(LOCATION),
            location::LocationCollector::new(c.geoip, c.settings, c.geoip_timeout_secs),
        )
        .build()
}

/// Insert `value` under `key` when present.
pub(crate) fn put(facts: &mut Facts, key: &str, value: Option<impl ToString>) {
    if let Some(v) = value {
        facts.insert(key.to_string(), v.to_string());
    }
}
