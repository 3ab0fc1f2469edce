// Transaction port for atomic upgrade steps

use crate::domain::{UpgradeStep, Version};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Operations available to an upgrade step while its transaction is open
#[async_trait]
pub trait UpgradeTransaction: Transaction {
    /// Run a multi-statement SQL script
    async fn run_script(&mut self, sql: &str) -> Result<()>;

    /// Execute a single statement, returning the affected row count
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Fetch a single integer (first column of first row), if any
    async fn query_i64(&mut self, sql: &str) -> Result<Option<i64>>;

    /// Check whether `table` currently has `column`
    async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool>;

    /// Append a row to the version table
    async fn record_step(&mut self, version: &Version, step: UpgradeStep) -> Result<()>;
}
