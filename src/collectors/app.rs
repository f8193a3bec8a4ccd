use crate::domain::collector::{Collector, Facts};
use crate::error::CollectionError;

use super::put;

/// Application name and version.
pub struct AppCollector {
    name: String,
    version: String,
}

impl AppCollector {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// This binary's own package name and version.
    pub fn current() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

impl Collector for AppCollector {
    fn id(&self) -> &str {
        super::APP
    }

    fn description(&self) -> &str {
        "Application name and version"
    }

    fn keys(&self) -> &[&'static str] {
        &[
            "app_name",
            "app_version",
            "app_version_major",
            "app_version_minor",
            "app_version_patch",
        ]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let mut facts = Facts::new();
        facts.insert("app_name".to_string(), self.name.clone());
        facts.insert("app_version".to_string(), self.version.clone());

        // Non-semver versions are reported verbatim without the split.
        let parsed = semver::Version::parse(&self.version).ok();
        put(&mut facts, "app_version_major", parsed.as_ref().map(|v| v.major));
        put(&mut facts, "app_version_minor", parsed.as_ref().map(|v| v.minor));
        put(&mut facts, "app_version_patch", parsed.as_ref().map(|v| v.patch));
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_semver_components() {
        let facts = AppCollector::new("beacon", "1.12.3").collect().unwrap();
        assert_eq!(facts["app_version"], "1.12.3");
        assert_eq!(facts["app_version_major"], "1");
        assert_eq!(facts["app_version_minor"], "12");
        assert_eq!(facts["app_version_patch"], "3");
    }

    #[test]
    fn non_semver_version_is_kept_verbatim() {
        let facts = AppCollector::new("beacon", "5.0").collect().unwrap();
        assert_eq!(facts["app_version"], "5.0");
        assert!(!facts.contains_key("app_version_major"));
    }
}
