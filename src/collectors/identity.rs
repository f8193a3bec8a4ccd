use crate::domain::collector::{Collector, Facts};
use crate::domain::identity::InstallationIdentity;
use crate::error::CollectionError;

pub struct IdentityCollector {
    identity: InstallationIdentity,
}

impl IdentityCollector {
    pub fn new(identity: InstallationIdentity) -> Self {
        Self { identity }
    }
}

impl Collector for IdentityCollector {
    fn id(&self) -> &str {
        super::IDENTITY
    }

    fn description(&self) -> &str {
        "Installation identifiers (software, database, hardware, OS)"
    }

    fn keys(&self) -> &[&'static str] {
        &["id_software", "id_database", "id_hardware", "id_os"]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let id = &self.identity;
        Ok([
            ("id_software", &id.software_id),
            ("id_database", &id.database_id),
            ("id_hardware", &id.hardware_id),
            ("id_os", &id.os_id),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect())
    }
}
