//! Error taxonomy for the telemetry pipeline.
//!
//! Collection errors are isolated per collector, delivery errors are
//! classified for the daemon's retry policy, configuration errors are fatal
//! at startup.

use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An unexpected collaborator fault inside a single collector.
#[derive(Debug, Error)]
#[error("collector {category} failed: {source}")]
pub struct CollectionError {
    pub category: String,
    #[source]
    pub source: BoxError,
}

impl CollectionError {
    pub fn new(category: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            category: category.into(),
            source: source.into(),
        }
    }
}

/// Failure to hand a snapshot to the remote endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Network trouble, timeouts, 5xx. Retried on the next due tick.
    #[error("transient delivery failure: {0}")]
    Transient(String),
    /// Broken configuration or payload. Stops the daemon.
    #[error("fatal delivery failure: {0}")]
    Fatal(String),
}

impl DeliveryError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeliveryError::Fatal(_))
    }
}

/// Startup misconfiguration. Never recoverable by retry.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("collector registered with an empty category code")]
    EmptyCategory,

    #[error("category {0} registered twice")]
    DuplicateCategory(String),

    #[error("key '{key}' emitted by both {first} and {second}")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("reporting daemon requires a tokio runtime")]
    NoRuntime,

    #[error("installation identity unavailable: {0}")]
    Identity(#[source] StoreError),

    #[error("settings store unavailable: {0}")]
    Store(#[source] StoreError),

    #[error("delivery client: {0}")]
    Delivery(String),
}

/// Consent updates that would violate the record's invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsentError {
    #[error("reporting cannot be enabled with no authorized categories")]
    NoCategories,
}

/// Persistence failures of the settings/identity files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("serializing state: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error(transparent)]
    Consent(#[from] ConsentError),
}

/// GeoIP lookup failure.
#[derive(Debug, Error)]
pub enum GeoIpError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} reported failure: {message}")]
    Provider { provider: String, message: String },
}
