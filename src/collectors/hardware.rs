use crate::domain::collector::{Collector, Facts};
use crate::error::CollectionError;
use crate::platform;

use super::put;

/// CPU and memory facts. Anything procfs does not expose is omitted.
pub struct HardwareCollector;

impl Collector for HardwareCollector {
    fn id(&self) -> &str {
        super::HW
    }

    fn description(&self) -> &str {
        "Processor and memory"
    }

    fn keys(&self) -> &[&'static str] {
        &[
            "hw_cpu_model",
            "hw_cpu_vendor",
            "hw_cpu_threads",
            "hw_memory_total_mb",
        ]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let mut facts = Facts::new();
        put(&mut facts, "hw_cpu_model", platform::cpu_model());
        put(&mut facts, "hw_cpu_vendor", platform::cpu_vendor());
        put(&mut facts, "hw_cpu_threads", platform::cpu_threads());
        put(&mut facts, "hw_memory_total_mb", platform::memory_total_mb());
        Ok(facts)
    }
}
