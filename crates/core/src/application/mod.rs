// Application Layer - Use Cases

pub mod upgrade;

// Re-exports
pub use upgrade::{
    DatabaseUpgradeChecker, DbUpgrade, PlannedStep, UpgradeConfig, UpgradeOutcome, UpgradePlan,
    UpgradeRegistry,
};
