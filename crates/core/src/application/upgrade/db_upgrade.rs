// DbUpgrade - one versioned unit of schema/data migration

use crate::domain::Version;
use crate::error::Result;
use crate::port::UpgradeTransaction;
use async_trait::async_trait;

/// A single upgrade step from a range of versions to `upgraded_version()`
///
/// Scripts are referenced by name and resolved through a `ScriptSource`,
/// so the same step can run embedded scripts or an operator-supplied copy.
#[async_trait]
pub trait DbUpgrade: Send + Sync {
    /// Inclusive range of database versions this step applies to
    fn upgradable_range(&self) -> (Version, Version);

    /// Version the database is at after this step
    fn upgraded_version(&self) -> Version;

    /// Whether older management servers may keep running during the step
    fn supports_rolling_upgrade(&self) -> bool;

    /// Scripts run before the data migration, in order
    fn prepare_scripts(&self) -> Vec<&'static str>;

    /// Straight-line data fix-ups, run in the same transaction as the
    /// prepare scripts
    async fn perform_data_migration(&self, tx: &mut dyn UpgradeTransaction) -> Result<()>;

    /// Scripts run once every step's prepare phase has committed
    fn cleanup_scripts(&self) -> Vec<&'static str>;
}
