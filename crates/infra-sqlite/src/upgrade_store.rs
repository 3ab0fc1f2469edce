// SQLite UpgradeStore Implementation

use crate::error::map_sqlx_error;
use crate::transaction::SqliteUpgradeTransaction;
use async_trait::async_trait;
use nimbus_core::domain::{UpgradeStep, Version, VersionRecord};
use nimbus_core::error::{AppError, Result};
use nimbus_core::port::{SchemaState, TimeProvider, UpgradeStore, UpgradeTransaction};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS version (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version TEXT NOT NULL,
    updated INTEGER NOT NULL,
    step TEXT NOT NULL
)
"#;

pub struct SqliteUpgradeStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteUpgradeStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl UpgradeStore for SqliteUpgradeStore {
    async fn schema_state(&self) -> Result<SchemaState> {
        if self.table_exists("version").await? {
            return Ok(SchemaState::Versioned);
        }

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(if tables == 0 {
            SchemaState::Empty
        } else {
            SchemaState::Unversioned
        })
    }

    async fn ensure_version_table(&self) -> Result<()> {
        sqlx::query(VERSION_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn version_history(&self) -> Result<Vec<VersionRecord>> {
        if !self.table_exists("version").await? {
            return Ok(Vec::new());
        }

        let rows: Vec<VersionRow> =
            sqlx::query_as("SELECT id, version, updated, step FROM version ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(VersionRow::into_record).collect()
    }

    async fn dump(&self, destination: &Path) -> Result<()> {
        let path = destination.to_str().ok_or_else(|| {
            AppError::Validation(format!("dump path is not UTF-8: {}", destination.display()))
        })?;

        sqlx::query("VACUUM INTO ?")
            .bind(path)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        info!(path, "Database dumped");
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn UpgradeTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(SqliteUpgradeTransaction::new(
            tx,
            self.time_provider.clone(),
        )))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    id: i64,
    version: String,
    updated: i64,
    step: String,
}

impl VersionRow {
    fn into_record(self) -> Result<VersionRecord> {
        Ok(VersionRecord {
            id: self.id,
            version: self.version.parse::<Version>()?,
            updated: self.updated,
            step: self.step.parse::<UpgradeStep>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;
    use nimbus_core::port::SystemTimeProvider;

    async fn store() -> SqliteUpgradeStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        SqliteUpgradeStore::new(pool, Arc::new(SystemTimeProvider))
    }

    #[tokio::test]
    async fn test_schema_state_transitions() {
        let store = store().await;
        assert_eq!(store.schema_state().await.unwrap(), SchemaState::Empty);
        assert!(store.version_history().await.unwrap().is_empty());

        sqlx::query("CREATE TABLE host (id INTEGER PRIMARY KEY)")
            .execute(store.pool())
            .await
            .unwrap();
        assert_eq!(store.schema_state().await.unwrap(), SchemaState::Unversioned);

        store.ensure_version_table().await.unwrap();
        store.ensure_version_table().await.unwrap();
        assert_eq!(store.schema_state().await.unwrap(), SchemaState::Versioned);
    }

    #[tokio::test]
    async fn test_recorded_steps_come_back_in_order() {
        let store = store().await;
        store.ensure_version_table().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.record_step(&Version::new(4, 0, 0), UpgradeStep::Complete)
            .await
            .unwrap();
        tx.record_step(&Version::new(4, 1, 0), UpgradeStep::Upgrade)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let history = store.version_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, Version::new(4, 0, 0));
        assert_eq!(history[0].step, UpgradeStep::Complete);
        assert_eq!(history[1].step, UpgradeStep::Upgrade);
        assert!(history[0].id < history[1].id);
    }

    #[tokio::test]
    async fn test_rollback_discards_steps() {
        let store = store().await;
        store.ensure_version_table().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.record_step(&Version::new(4, 0, 0), UpgradeStep::Complete)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(store.version_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_column_exists_and_query() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.run_script("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (7);")
            .await
            .unwrap();

        assert!(tx.column_exists("t", "a").await.unwrap());
        assert!(!tx.column_exists("t", "b").await.unwrap());
        assert_eq!(tx.query_i64("SELECT a FROM t").await.unwrap(), Some(7));
        assert_eq!(tx.query_i64("SELECT a FROM t WHERE a > 10").await.unwrap(), None);
        assert_eq!(tx.execute("UPDATE t SET a = 8").await.unwrap(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_step_is_reported() {
        let store = store().await;
        store.ensure_version_table().await.unwrap();
        sqlx::query("INSERT INTO version (version, updated, step) VALUES ('4.0.0', 0, 'Bogus')")
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(
            store.version_history().await,
            Err(AppError::Domain(_))
        ));
    }
}
