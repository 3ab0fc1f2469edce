// Upgrade Store Port (Interface)

use crate::domain::VersionRecord;
use crate::error::Result;
use crate::port::UpgradeTransaction;
use async_trait::async_trait;
use std::path::Path;

/// What the store found when it looked at the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No tables at all (fresh install)
    Empty,
    /// Tables exist but predate version tracking
    Unversioned,
    /// Version table present
    Versioned,
}

/// Persistence interface for schema upgrades
#[async_trait]
pub trait UpgradeStore: Send + Sync {
    /// Inspect the database
    async fn schema_state(&self) -> Result<SchemaState>;

    /// Create the version table if it does not exist yet
    async fn ensure_version_table(&self) -> Result<()>;

    /// All version rows, oldest first
    async fn version_history(&self) -> Result<Vec<VersionRecord>>;

    /// Copy the whole database to `destination`
    async fn dump(&self, destination: &Path) -> Result<()>;

    /// Begin a transaction for one upgrade step
    async fn begin(&self) -> Result<Box<dyn UpgradeTransaction>>;
}
