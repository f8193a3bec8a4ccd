//! Collector contract and the priority-ordered registry.
//!
//! Every collector owns one category code and a fixed set of keys. The
//! registry runs the collectors whose category is authorized by the consent
//! map and merges their output into one snapshot. A failing collector only
//! removes its own keys from the snapshot.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{CollectionError, ConfigurationError};

/// Flat key/value facts produced by a collector.
pub type Facts = BTreeMap<String, String>;

/// Category code → authorized.
pub type ConsentMap = BTreeMap<String, bool>;

/// One facet of the running system.
pub trait Collector: Send + Sync {
    /// Stable, unique, non-empty category code (e.g. `"APP"`).
    fn id(&self) -> &str;

    /// Human-readable description, for display only.
    fn description(&self) -> &str;

    /// Every key this collector may emit.
    fn keys(&self) -> &[&'static str];

    /// Gather the facts. Facts that are simply unavailable are omitted;
    /// an error means a collaborator fault.
    fn collect(&self) -> Result<Facts, CollectionError>;

    fn is_selected(&self, consent: &ConsentMap) -> bool {
        consent.get(self.id()).copied().unwrap_or(false)
    }
}

struct Registered {
    priority: u32,
    collector: Box<dyn Collector>,
}

/// Collects registrations and validates them once.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<Registered>,
}

impl RegistryBuilder {
    pub fn register(mut self, priority: u32, collector: impl Collector + 'static) -> Self {
        self.entries.push(Registered {
            priority,
            collector: Box::new(collector),
        });
        self
    }

    /// Sort by priority (ties by category code) and check that ids are
    /// non-empty and unique and that no key is shared by two collectors.
    pub fn build(mut self) -> Result<CollectorRegistry, ConfigurationError> {
        self.entries.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.collector.id().cmp(b.collector.id()))
        });

        self.validate()?;
        Ok(CollectorRegistry {
            entries: self.entries,
        })
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        let mut seen_ids: Vec<&str> = Vec::new();

        for entry in &self.entries {
            let id = entry.collector.id();
            if id.is_empty() {
                return Err(ConfigurationError::EmptyCategory);
            }
            if seen_ids.contains(&id) {
                return Err(ConfigurationError::DuplicateCategory(id.to_string()));
            }
            seen_ids.push(id);

            for key in entry.collector.keys() {
                if let Some(first) = owners.insert(*key, id) {
                    return Err(ConfigurationError::DuplicateKey {
                        key: key.to_string(),
                        first: first.to_string(),
                        second: id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// All known collectors in priority order. Immutable after `build()`.
pub struct CollectorRegistry {
    entries: Vec<Registered>,
}

impl CollectorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Run every collector selected by `consent` and merge the results.
    ///
    /// Never fails: a collector error or panic is logged and that
    /// collector's keys are left out. Keys a collector did not declare are dropped.
    pub fn collect_enabled(&self, consent: &ConsentMap) -> Facts {
        let mut snapshot = Facts::new();

        for entry in &self.entries {
            let collector = entry.collector.as_ref();
            if !collector.is_selected(consent) {
                continue;
            }

            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| collector.collect())) {
                Ok(outcome) => outcome,
                Err(payload) => Err(CollectionError::new(
                    collector.id(),
                    format!("collector panicked: {}", panic_message(payload.as_ref())),
                )),
            };

            match outcome {
                Ok(facts) => {
                    debug!(category = collector.id(), keys = facts.len(), "collector finished");
                    for (key, value) in facts {
                        if collector.keys().iter().any(|k| *k == key.as_str()) {
                            snapshot.insert(key, value);
                        } else {
                            warn!(
                                category = collector.id(),
                                key = %key,
                                "dropping undeclared key"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(category = %e.category, error = %e.source, "collector failed, omitting its facts");
                }
            }
        }

        snapshot
    }

    /// `(category, description)` pairs in priority order.
    pub fn categories(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.collector.id().to_string(),
                    e.collector.description().to_string(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
