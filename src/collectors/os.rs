use crate::domain::collector::{Collector, Facts};
use crate::error::CollectionError;
use crate::platform;

use super::put;

/// Operating system family, distribution and kernel.
pub struct OsCollector;

impl Collector for OsCollector {
    fn id(&self) -> &str {
        super::OS
    }

    fn description(&self) -> &str {
        "Operating system family, distribution and kernel"
    }

    fn keys(&self) -> &[&'static str] {
        &["os_family", "os_arch", "os_name", "os_version", "os_kernel"]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let mut facts = Facts::new();
        facts.insert("os_family".to_string(), std::env::consts::OS.to_string());
        facts.insert("os_arch".to_string(), std::env::consts::ARCH.to_string());
        put(&mut facts, "os_name", platform::os_release_field("PRETTY_NAME"));
        put(&mut facts, "os_version", platform::os_release_field("VERSION_ID"));
        put(&mut facts, "os_kernel", platform::kernel_release());
        Ok(facts)
    }
}
