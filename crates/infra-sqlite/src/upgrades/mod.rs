// Schema upgrade chain for the SQLite dialect

mod upgrade_400_to_410;
mod upgrade_410_to_420;
mod upgrade_420_to_430;

pub use upgrade_400_to_410::Upgrade400to410;
pub use upgrade_410_to_420::Upgrade410to420;
pub use upgrade_420_to_430::{Upgrade420to430, ROUTER_TEMPLATE};

use nimbus_core::application::{DbUpgrade, UpgradeRegistry};
use nimbus_core::domain::Version;
use std::sync::Arc;

/// Version created by `create-schema.sql`
pub const BASE_VERSION: (u32, u32, u32) = (4, 0, 0);
/// Version this build expects
pub const CODE_VERSION: (u32, u32, u32) = (4, 3, 0);

fn version((major, minor, patch): (u32, u32, u32)) -> Version {
    Version::new(major, minor, patch)
}

/// Every supported database version and the steps that bring it to `CODE_VERSION`
pub fn registry() -> UpgradeRegistry {
    let to_410: Arc<dyn DbUpgrade> = Arc::new(Upgrade400to410);
    let to_420: Arc<dyn DbUpgrade> = Arc::new(Upgrade410to420);
    let to_430: Arc<dyn DbUpgrade> = Arc::new(Upgrade420to430);

    let from_40x = vec![to_410.clone(), to_420.clone(), to_430.clone()];
    let from_41x = vec![to_420.clone(), to_430.clone()];

    UpgradeRegistry::new(version(BASE_VERSION), "create-schema.sql", version(CODE_VERSION))
        .register(Version::new(4, 0, 0), from_40x.clone())
        .register(Version::new(4, 0, 1), from_40x.clone())
        .register(Version::new(4, 0, 2), from_40x)
        .register(Version::new(4, 1, 0), from_41x.clone())
        .register(Version::new(4, 1, 1), from_41x)
        .register(Version::new(4, 2, 0), vec![to_430])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, ScriptResolver, SqliteUpgradeStore};
    use nimbus_core::application::{DatabaseUpgradeChecker, UpgradeConfig, UpgradeOutcome};
    use nimbus_core::domain::UpgradeStep;
    use nimbus_core::error::AppError;
    use nimbus_core::port::{ScriptSource, SystemTimeProvider, UpgradeStore};
    use sqlx::SqlitePool;

    fn checker(pool: SqlitePool, config: UpgradeConfig) -> DatabaseUpgradeChecker {
        DatabaseUpgradeChecker::new(
            Arc::new(SqliteUpgradeStore::new(pool, Arc::new(SystemTimeProvider))),
            Arc::new(ScriptResolver::embedded()),
            Arc::new(registry()),
            Arc::new(SystemTimeProvider),
            config,
        )
    }

    async fn column_count(pool: &SqlitePool, table: &str, column: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    /// A 4.0.0 database without a version table, with one OVM host and a router
    async fn legacy_database(pool: &SqlitePool) {
        let base = ScriptResolver::embedded().load("create-schema.sql").unwrap();
        let mut tx = pool.begin().await.unwrap();
        for statement in crate::transaction::split_statements(&base) {
            sqlx::query(&statement).execute(&mut *tx).await.unwrap();
        }
        for statement in [
            "DROP TABLE version",
            "UPDATE configuration SET value = 'secret' WHERE name = 'ovm.agent.password'",
            "INSERT INTO host (id, uuid, name, hypervisor_type) VALUES (1, 'h-1', 'ovm-1', 'Ovm')",
            "INSERT INTO host (id, uuid, name, hypervisor_type) VALUES (2, 'h-2', 'kvm-1', 'KVM')",
            "INSERT INTO networks (id, uuid, name, traffic_type) VALUES (10, 'n-10', 'guest', 'Guest')",
            "INSERT INTO vm_instance (id, uuid, instance_name, type, state, host_id) \
             VALUES (100, 'v-100', 'r-100-VM', 'DomainRouter', 'Running', 1)",
            "INSERT INTO domain_router (id, network_id) VALUES (100, 10)",
        ] {
            sqlx::query(statement).execute(&mut *tx).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[test]
    fn test_every_registered_path_is_valid() {
        let registry = registry();
        let versions: Vec<Version> = registry.known_versions().cloned().collect();
        assert_eq!(versions.len(), 6);
        for v in versions {
            let path = registry.path_from(&v).unwrap().unwrap();
            assert_eq!(path.last().unwrap().upgraded_version(), Version::new(4, 3, 0));
        }
    }

    #[tokio::test]
    async fn test_fresh_install_reaches_code_version() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let checker = checker(pool.clone(), UpgradeConfig::default());

        let outcome = checker.check().await.unwrap();
        assert_eq!(
            outcome,
            UpgradeOutcome::Installed {
                base: Version::new(4, 0, 0),
                to: Version::new(4, 3, 0)
            }
        );
        assert_eq!(
            checker.current_version().await.unwrap(),
            Some(Version::new(4, 3, 0))
        );
        assert_eq!(column_count(&pool, "domain_router", "network_id").await, 0);
        assert_eq!(column_count(&pool, "networks", "vpc_id").await, 1);

        let template: String =
            sqlx::query_scalar("SELECT value FROM configuration WHERE name = 'router.template.ovm'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(template, ROUTER_TEMPLATE);

        // second run has nothing to do
        assert_eq!(
            checker.check().await.unwrap(),
            UpgradeOutcome::UpToDate(Version::new(4, 3, 0))
        );
    }

    #[tokio::test]
    async fn test_legacy_data_is_migrated() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        legacy_database(&pool).await;
        let checker = checker(pool.clone(), UpgradeConfig::default());

        let plan = checker.plan().await.unwrap();
        assert_eq!(plan.current, Some(Version::new(4, 0, 0)));
        assert_eq!(plan.steps.len(), 3);
        assert!(plan.steps[2].rolling);

        let outcome = checker.check().await.unwrap();
        assert_eq!(
            outcome,
            UpgradeOutcome::Upgraded {
                from: Version::new(4, 0, 0),
                to: Version::new(4, 3, 0),
                steps: 3
            }
        );

        let details: Vec<(i64, String, Option<String>)> =
            sqlx::query_as("SELECT host_id, name, value FROM host_details ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(
            details,
            vec![
                (1, "password".to_string(), Some("secret".to_string())),
                (1, "port".to_string(), Some("8899".to_string())),
                (1, "username".to_string(), Some("oracle".to_string())),
            ]
        );

        let globals: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM configuration WHERE name LIKE 'ovm.agent.%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        // only the timeout stays global
        assert_eq!(globals, 1);

        let refs: Vec<(i64, i64, String)> =
            sqlx::query_as("SELECT router_id, network_id, guest_type FROM router_network_ref")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(refs, vec![(100, 10, "Isolated".to_string())]);

        let display: String =
            sqlx::query_scalar("SELECT display_name FROM vm_instance WHERE id = 100")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(display, "r-100-VM");
    }

    #[tokio::test]
    async fn test_history_records_each_phase() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        legacy_database(&pool).await;
        let checker = checker(pool, UpgradeConfig::default());
        checker.check().await.unwrap();

        let steps: Vec<(String, UpgradeStep)> = checker
            .history()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.version.to_string(), r.step))
            .collect();

        assert_eq!(
            steps,
            vec![
                ("4.1.0".to_string(), UpgradeStep::Upgrade),
                ("4.2.0".to_string(), UpgradeStep::Upgrade),
                ("4.3.0".to_string(), UpgradeStep::Upgrade),
                ("4.1.0".to_string(), UpgradeStep::Cleanup),
                ("4.1.0".to_string(), UpgradeStep::Complete),
                ("4.2.0".to_string(), UpgradeStep::Cleanup),
                ("4.2.0".to_string(), UpgradeStep::Complete),
                ("4.3.0".to_string(), UpgradeStep::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_version_has_no_path() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let store = SqliteUpgradeStore::new(pool.clone(), Arc::new(SystemTimeProvider));
        store.ensure_version_table().await.unwrap();
        sqlx::query("INSERT INTO version (version, updated, step) VALUES ('3.9.0', 0, 'Complete')")
            .execute(&pool)
            .await
            .unwrap();

        let err = checker(pool, UpgradeConfig::default()).check().await.unwrap_err();
        assert!(matches!(err, AppError::Upgrade(_)));
        assert!(err.to_string().contains("3.9.0"));
    }
}
