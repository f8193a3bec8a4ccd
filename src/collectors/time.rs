use chrono::Local;

use crate::domain::collector::{Collector, Facts};
use crate::error::CollectionError;

pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Local wall-clock time of the collection.
pub struct TimeCollector;

impl Collector for TimeCollector {
    fn id(&self) -> &str {
        super::TIME
    }

    fn description(&self) -> &str {
        "Time the application was last used"
    }

    fn keys(&self) -> &[&'static str] {
        &["time_last_used"]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let mut facts = Facts::new();
        facts.insert(
            "time_last_used".to_string(),
            Local::now().format(TIME_FORMAT).to_string(),
        );
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_parseable_local_timestamp() {
        let facts = TimeCollector.collect().unwrap();
        let value = &facts["time_last_used"];
        assert!(chrono::NaiveDateTime::parse_from_str(value, TIME_FORMAT).is_ok());
    }
}
