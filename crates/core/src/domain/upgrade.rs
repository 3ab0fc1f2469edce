// Upgrade bookkeeping - rows of the `version` table

use super::error::DomainError;
use super::version::Version;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Step recorded in the version table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeStep {
    /// Database copied aside before upgrading
    Dump,
    /// Prepare scripts and data migration committed
    Upgrade,
    /// Cleanup scripts committed
    Cleanup,
    /// Version fully installed
    Complete,
}

impl UpgradeStep {
    /// Steps after which the schema is in a half-upgraded state
    pub fn is_in_progress(&self) -> bool {
        matches!(self, UpgradeStep::Upgrade | UpgradeStep::Cleanup)
    }
}

impl std::fmt::Display for UpgradeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpgradeStep::Dump => write!(f, "Dump"),
            UpgradeStep::Upgrade => write!(f, "Upgrade"),
            UpgradeStep::Cleanup => write!(f, "Cleanup"),
            UpgradeStep::Complete => write!(f, "Complete"),
        }
    }
}

impl FromStr for UpgradeStep {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Dump" => Ok(UpgradeStep::Dump),
            "Upgrade" => Ok(UpgradeStep::Upgrade),
            "Cleanup" => Ok(UpgradeStep::Cleanup),
            "Complete" => Ok(UpgradeStep::Complete),
            other => Err(DomainError::InvalidStep(other.to_string())),
        }
    }
}

/// One row of the version table
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub id: i64,
    pub version: Version,
    /// Epoch millis
    pub updated: i64,
    pub step: UpgradeStep,
}
