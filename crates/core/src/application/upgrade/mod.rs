// Schema Upgrade - version sequencing and step execution

mod checker;
mod db_upgrade;
mod registry;

pub use checker::{DatabaseUpgradeChecker, PlannedStep, UpgradeConfig, UpgradeOutcome, UpgradePlan};
pub use db_upgrade::DbUpgrade;
pub use registry::UpgradeRegistry;
