//! Beacon: consent-gated usage telemetry.
//!
//! Collectors gather facts per category, the registry filters them through
//! the operator's consent, and a single background daemon delivers at most
//! one snapshot per calendar day.

pub mod api {
    pub mod rest;
}
pub mod client;
pub mod collectors;
pub mod config;
pub mod domain;
pub mod error;
pub mod geoip;
pub mod platform;
pub mod server;
pub mod telemetry;

pub use domain::collector::{Collector, CollectorRegistry, ConsentMap, Facts};
pub use domain::consent::{Activation, ConsentRecord, ConsentUpdate};
pub use domain::identity::InstallationIdentity;
pub use domain::settings_store::{Settings, SettingsStore, SettingsUpdate, YamlSettingsStore};
pub use error::{CollectionError, ConfigurationError, ConsentError, DeliveryError, StoreError};
pub use telemetry::delivery::{Delivery, HttpDelivery};
pub use telemetry::{DaemonParts, ReportingDaemon};
