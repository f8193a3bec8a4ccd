//! Which categories the operator authorized for reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collector::ConsentMap;
use crate::error::ConsentError;

/// Overall reporting switch. `NeverConfigured` and `Disabled` both suppress
/// sending; only the former means no decision was ever taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Activation {
    #[default]
    NeverConfigured,
    Enabled,
    Disabled,
}

impl From<Option<bool>> for Activation {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Activation::NeverConfigured,
            Some(true) => Activation::Enabled,
            Some(false) => Activation::Disabled,
        }
    }
}

impl From<Activation> for Option<bool> {
    fn from(value: Activation) -> Self {
        match value {
            Activation::NeverConfigured => None,
            Activation::Enabled => Some(true),
            Activation::Disabled => Some(false),
        }
    }
}

/// Per-installation consent record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    #[serde(default)]
    pub active: Activation,
    #[serde(default)]
    pub categories: ConsentMap,
    #[serde(default)]
    pub opt_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub opt_out_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// External request to change consent. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsentUpdate {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub categories: Option<ConsentMap>,
}

impl ConsentRecord {
    pub fn is_category_enabled(&self, code: &str) -> bool {
        self.categories.get(code).copied().unwrap_or(false)
    }

    pub fn is_reporting_active(&self) -> bool {
        self.active == Activation::Enabled
    }

    /// Categories currently authorized, in code order.
    pub fn enabled_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Apply an update all-or-nothing.
    ///
    /// Turning reporting on stamps `opt_in_at`, turning it off stamps
    /// `opt_out_at`. An update that would leave reporting enabled with no
    /// authorized category is rejected and the record stays unchanged.
    pub fn apply(&mut self, update: ConsentUpdate, now: DateTime<Utc>) -> Result<(), ConsentError> {
        let categories = update.categories.unwrap_or_else(|| self.categories.clone());
        let active = match update.active {
            Some(flag) => Activation::from(Some(flag)),
            None => self.active,
        };

        if active == Activation::Enabled && !categories.values().any(|enabled| *enabled) {
            return Err(ConsentError::NoCategories);
        }

        match (self.active, active) {
            (Activation::Enabled, Activation::Enabled) => {}
            (_, Activation::Enabled) => self.opt_in_at = Some(now),
            (previous, Activation::Disabled) if previous != Activation::Disabled => {
                self.opt_out_at = Some(now)
            }
            _ => {}
        }

        self.active = active;
        self.categories = categories;
        Ok(())
    }
}
