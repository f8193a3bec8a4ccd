use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::collector::{Collector, Facts};
use crate::error::CollectionError;

use super::put;

/// Aggregate usage counters of the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalCounts {
    #[serde(default)]
    pub active_wards: Option<u64>,
    #[serde(default)]
    pub users: Option<u64>,
    #[serde(default)]
    pub patients: Option<u64>,
    #[serde(default)]
    pub admissions: Option<u64>,
}

/// Collaborator exposing the host's usage counters.
pub trait HospitalFacts: Send + Sync {
    fn counts(&self) -> Result<HospitalCounts, CollectionError>;
}

impl HospitalFacts for HospitalCounts {
    fn counts(&self) -> Result<HospitalCounts, CollectionError> {
        Ok(self.clone())
    }
}

/// Counters exported by the host application as a JSON file.
///
/// A missing file means the host has not exported anything yet and yields
/// no facts; an unreadable or malformed file is a collaborator fault.
pub struct CountsFile {
    path: PathBuf,
}

impl CountsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HospitalFacts for CountsFile {
    fn counts(&self) -> Result<HospitalCounts, CollectionError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HospitalCounts::default())
            }
            Err(e) => return Err(CollectionError::new(super::HOSPITAL, e)),
        };
        serde_json::from_str(&content).map_err(|e| CollectionError::new(super::HOSPITAL, e))
    }
}

pub struct HospitalCollector {
    source: Arc<dyn HospitalFacts>,
}

impl HospitalCollector {
    pub fn new(source: Arc<dyn HospitalFacts>) -> Self {
        Self { source }
    }
}

impl Collector for HospitalCollector {
    fn id(&self) -> &str {
        super::HOSPITAL
    }

    fn description(&self) -> &str {
        "Aggregate counts of wards, users, patients and admissions"
    }

    fn keys(&self) -> &[&'static str] {
        &["hosp_active_wards", "hosp_users", "hosp_patients", "hosp_admissions"]
    }

    fn collect(&self) -> Result<Facts, CollectionError> {
        let counts = self.source.counts()?;
        let mut facts = Facts::new();
        put(&mut facts, "hosp_active_wards", counts.active_wards);
        put(&mut facts, "hosp_users", counts.users);
        put(&mut facts, "hosp_patients", counts.patients);
        put(&mut facts, "hosp_admissions", counts.admissions);
        Ok(facts)
    }
}
