use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::collector::{Collector, Facts};
use crate::error::CollectionError;

use super::put;

/// Database product/driver facts supplied by the host's data-access layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseProduct {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_version: Option<String>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub driver_version: Option<String>,
}

/// Collaborator describing the database in use.
pub trait DatabaseInfo: Send + Sync {
    fn describe(&self) -> Result<DatabaseProduct, CollectionError>;
}

/// Static facts, e.g. from configuration.
impl DatabaseInfo for DatabaseProduct {
    fn describe(&self) -> Result<DatabaseProduct, CollectionError> {
        Ok(self.clone())
    }
}

pub struct DbmsCollector {
    source: Arc<dyn DatabaseInfo>,
}

impl DbmsCollector {
    pub fn new(source: Arc<dyn DatabaseInfo>) -> Self {
        Self { source }
    }
}

impl Collector for DbmsCollector {
    fn id(&self) -> &str {
        super::DBMS
    }

    fn description(&self) -> &str {
        "Database product and driver versions"
    }

    fn keys(&self) -> &[&'static str] {
        &[
            "dbms_product_name",
            "dbms_product_version",
            "dbms_driver_name",
            "dbms_driver_version",
        ]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let product = self.source.describe()?;
        let mut facts = Facts::new();
        put(&mut facts, "dbms_product_name", product.product_name);
        put(&mut facts, "dbms_product_version", product.product_version);
        put(&mut facts, "dbms_driver_name", product.driver_name);
        put(&mut facts, "dbms_driver_version", product.driver_version);
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    impl DatabaseInfo for Unreachable {
        fn describe(&self) -> Result<DatabaseProduct, CollectionError> {
            Err(CollectionError::new(super::super::DBMS, "metadata query timed out"))
        }
    }

    #[test]
    fn missing_fields_are_omitted() {
        let product = DatabaseProduct {
            product_name: Some("MariaDB".into()),
            driver_version: Some("3.3.3".into()),
            ..Default::default()
        };
        let facts = DbmsCollector::new(Arc::new(product)).collect().unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts["dbms_product_name"], "MariaDB");
        assert_eq!(facts["dbms_driver_version"], "3.3.3");
    }

    #[test]
    fn collaborator_fault_is_a_collection_error() {
        let err = DbmsCollector::new(Arc::new(Unreachable)).collect().unwrap_err();
        assert_eq!(err.category, "DBMS");
    }
}
