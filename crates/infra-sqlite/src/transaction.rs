// SQLite Transaction Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use nimbus_core::domain::{UpgradeStep, Version};
use nimbus_core::error::Result;
use nimbus_core::port::{TimeProvider, Transaction, UpgradeTransaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};
use std::sync::Arc;
use tracing::debug;

pub struct SqliteUpgradeTransaction<'a> {
    tx: SqlxTransaction<'a, Sqlite>,
    time_provider: Arc<dyn TimeProvider>,
}

impl<'a> SqliteUpgradeTransaction<'a> {
    pub fn new(tx: SqlxTransaction<'a, Sqlite>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { tx, time_provider }
    }
}

/// Split a script into statements, dropping `--` comment lines
pub(crate) fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|statement| {
            statement
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

#[async_trait]
impl Transaction for SqliteUpgradeTransaction<'_> {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl UpgradeTransaction for SqliteUpgradeTransaction<'_> {
    async fn run_script(&mut self, sql: &str) -> Result<()> {
        for statement in split_statements(sql) {
            debug!(statement = %statement, "Executing");
            sqlx::query(&statement)
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn query_i64(&mut self, sql: &str) -> Result<Option<i64>> {
        let value: Option<Option<i64>> = sqlx::query_scalar(sql)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(value.flatten())
    }

    async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
                .bind(table)
                .bind(column)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
        Ok(count > 0)
    }

    async fn record_step(&mut self, version: &Version, step: UpgradeStep) -> Result<()> {
        sqlx::query("INSERT INTO version (version, updated, step) VALUES (?, ?, ?)")
            .bind(version.to_string())
            .bind(self.time_provider.now_millis())
            .bind(step.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
