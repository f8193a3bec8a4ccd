//! Installation identity: four stable ids joined to every report.
//!
//! Generated on first start and persisted to `identity.yaml`; never
//! rewritten afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::platform;

use super::settings_store::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationIdentity {
    pub software_id: String,
    pub database_id: String,
    pub hardware_id: String,
    pub os_id: String,
}

impl InstallationIdentity {
    /// Fresh identity for this machine. Software and database ids are
    /// random; hardware and OS ids are derived from local facts so they
    /// come out the same when regenerated on the same host.
    pub fn generate() -> Self {
        let host = platform::hostname();
        let hardware_seed = format!(
            "{}|{}|{}",
            host,
            std::env::consts::ARCH,
            platform::cpu_model().unwrap_or_default()
        );
        let os_seed = format!(
            "{}|{}|{}",
            host,
            std::env::consts::OS,
            platform::os_release_field("ID").unwrap_or_default()
        );

        Self {
            software_id: Uuid::new_v4().to_string(),
            database_id: Uuid::new_v4().to_string(),
            hardware_id: derived_id(&hardware_seed),
            os_id: derived_id(&os_seed),
        }
    }

    /// Read the persisted identity, creating and persisting one if absent.
    pub fn load_or_create(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            return serde_yaml::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            });
        }

        let identity = Self::generate();
        let content = serde_yaml::to_string(&identity)?;
        write_atomic(path, &content)?;
        info!(
            path = %path.display(),
            software_id = %identity.software_id,
            "generated installation identity"
        );
        Ok(identity)
    }
}

/// SHA-256 of `seed` folded into a v4-shaped UUID string.
fn derived_id(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}
