//! Schema upgrades against database files on disk

use nimbus_core::application::{DatabaseUpgradeChecker, UpgradeConfig, UpgradeOutcome};
use nimbus_core::domain::{UpgradeStep, Version};
use nimbus_core::port::{ScriptSource, SystemTimeProvider};
use nimbus_core::AppError;
use nimbus_infra_sqlite::{create_pool, registry, ScriptResolver, SqliteUpgradeStore};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Scratch directory removed on drop
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("nimbus-it-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }

    fn database_url(&self) -> String {
        format!("sqlite://{}", self.0.join("nimbus.db").display())
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn checker(pool: &SqlitePool, scripts: ScriptResolver, config: UpgradeConfig) -> DatabaseUpgradeChecker {
    DatabaseUpgradeChecker::new(
        Arc::new(SqliteUpgradeStore::new(pool.clone(), Arc::new(SystemTimeProvider))),
        Arc::new(scripts),
        Arc::new(registry()),
        Arc::new(SystemTimeProvider),
        config,
    )
}

/// Base schema without version tracking, one OVM host
async fn seed_legacy(pool: &SqlitePool) {
    let base = ScriptResolver::embedded().load("create-schema.sql").unwrap();
    sqlx::raw_sql(&base).execute(pool).await.unwrap();
    sqlx::raw_sql(
        "DROP TABLE version;
         INSERT INTO host (id, uuid, name, hypervisor_type) VALUES (1, 'h-1', 'ovm-1', 'Ovm');",
    )
    .execute(pool)
    .await
    .unwrap();
}

async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await
            .unwrap();
    count == 1
}

#[tokio::test]
async fn test_install_survives_reopen() {
    let scratch = Scratch::new();

    {
        let pool = create_pool(&scratch.database_url()).await.unwrap();
        let outcome = checker(&pool, ScriptResolver::embedded(), UpgradeConfig::default())
            .check()
            .await
            .unwrap();
        assert!(matches!(outcome, UpgradeOutcome::Installed { .. }));
        pool.close().await;
    }

    let pool = create_pool(&scratch.database_url()).await.unwrap();
    let checker = checker(&pool, ScriptResolver::embedded(), UpgradeConfig::default());
    assert_eq!(
        checker.check().await.unwrap(),
        UpgradeOutcome::UpToDate(Version::new(4, 3, 0))
    );
    assert!(checker.plan().await.unwrap().is_noop());
}

#[tokio::test]
async fn test_dump_is_written_before_upgrading() {
    let scratch = Scratch::new();
    let dump_dir = scratch.path().join("dumps");
    let pool = create_pool(&scratch.database_url()).await.unwrap();
    seed_legacy(&pool).await;

    let config = UpgradeConfig {
        dump_dir: Some(dump_dir.clone()),
        legacy_version: None,
    };
    let checker = checker(&pool, ScriptResolver::embedded(), config);
    let outcome = checker.check().await.unwrap();
    assert_eq!(
        outcome,
        UpgradeOutcome::Upgraded {
            from: Version::new(4, 0, 0),
            to: Version::new(4, 3, 0),
            steps: 3
        }
    );

    let dumps: Vec<PathBuf> = std::fs::read_dir(&dump_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(dumps.len(), 1);
    let name = dumps[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("nimbus-4.0.0-"), "{}", name);

    let history = checker.history().await.unwrap();
    assert_eq!(history[0].step, UpgradeStep::Dump);
    assert_eq!(history[0].version, Version::new(4, 0, 0));

    // the dump holds the pre-upgrade schema
    let dumped = create_pool(&format!("sqlite://{}", dumps[0].display()))
        .await
        .unwrap();
    assert!(table_exists(&dumped, "host").await);
    assert!(!table_exists(&dumped, "host_details").await);
    assert!(!table_exists(&dumped, "vpc").await);
}

#[tokio::test]
async fn test_failed_step_blocks_next_run() {
    let scratch = Scratch::new();
    let overrides = scratch.path().join("scripts");
    std::fs::create_dir_all(&overrides).unwrap();
    std::fs::write(
        overrides.join("schema-420to430.sql"),
        "CREATE TABLE vpc (id INTEGER PRIMARY KEY);\nALTER TABLE no_such_table ADD COLUMN x INTEGER;\n",
    )
    .unwrap();

    let pool = create_pool(&scratch.database_url()).await.unwrap();
    seed_legacy(&pool).await;

    let broken = checker(
        &pool,
        ScriptResolver::with_override_dir(&overrides),
        UpgradeConfig::default(),
    );
    let err = broken.check().await.unwrap_err();
    assert!(matches!(err, AppError::Upgrade(_)), "{:?}", err);
    assert!(err.to_string().contains("schema-420to430.sql"));

    // the failing step rolled back, earlier steps stayed
    assert!(!table_exists(&pool, "vpc").await);
    assert!(table_exists(&pool, "host_details").await);

    let retry = checker(&pool, ScriptResolver::embedded(), UpgradeConfig::default());
    let err = retry.check().await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "{:?}", err);
    assert!(err.to_string().contains("4.1.0"));
}

#[tokio::test]
async fn test_configured_legacy_version_skips_steps() {
    let scratch = Scratch::new();
    let pool = create_pool(&scratch.database_url()).await.unwrap();
    seed_legacy(&pool).await;
    // pretend the 4.1.0 changes are already in place
    let step = ScriptResolver::embedded().load("schema-400to410.sql").unwrap();
    sqlx::raw_sql(&step).execute(&pool).await.unwrap();

    let config = UpgradeConfig {
        dump_dir: None,
        legacy_version: Some(Version::new(4, 1, 0)),
    };
    let checker = checker(&pool, ScriptResolver::embedded(), config);

    let plan = checker.plan().await.unwrap();
    assert_eq!(plan.current, Some(Version::new(4, 1, 0)));
    assert_eq!(plan.steps.len(), 2);

    let outcome = checker.check().await.unwrap();
    assert_eq!(
        outcome,
        UpgradeOutcome::Upgraded {
            from: Version::new(4, 1, 0),
            to: Version::new(4, 3, 0),
            steps: 2
        }
    );
    let versions: Vec<Version> = checker
        .history()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.step == UpgradeStep::Complete)
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, [Version::new(4, 2, 0), Version::new(4, 3, 0)]);
}

#[tokio::test]
async fn test_rolled_back_first_step_can_be_retried() {
    let scratch = Scratch::new();
    let dump_dir = scratch.path().join("dumps");
    let overrides = scratch.path().join("scripts");
    std::fs::create_dir_all(&overrides).unwrap();
    std::fs::write(
        overrides.join("schema-400to410.sql"),
        "ALTER TABLE no_such_table ADD COLUMN x INTEGER;\n",
    )
    .unwrap();

    let pool = create_pool(&scratch.database_url()).await.unwrap();
    seed_legacy(&pool).await;
    let config = UpgradeConfig {
        dump_dir: Some(dump_dir),
        legacy_version: None,
    };

    let broken = checker(&pool, ScriptResolver::with_override_dir(&overrides), config.clone());
    let err = broken.check().await.unwrap_err();
    assert!(err.to_string().contains("schema-400to410.sql"), "{}", err);
    assert!(!table_exists(&pool, "host_details").await);

    let steps: Vec<UpgradeStep> = broken
        .history()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.step)
        .collect();
    assert_eq!(steps, [UpgradeStep::Dump]);

    let retry = checker(&pool, ScriptResolver::embedded(), config);
    assert_eq!(
        retry.current_version().await.unwrap(),
        Some(Version::new(4, 0, 0))
    );
    let outcome = retry.check().await.unwrap();
    assert_eq!(
        outcome,
        UpgradeOutcome::Upgraded {
            from: Version::new(4, 0, 0),
            to: Version::new(4, 3, 0),
            steps: 3
        }
    );
    assert!(table_exists(&pool, "host_details").await);
}
