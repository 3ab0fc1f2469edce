// Database Upgrade Checker - decides what to run and runs it

use super::db_upgrade::DbUpgrade;
use super::registry::UpgradeRegistry;
use crate::domain::{UpgradeStep, Version, VersionRecord};
use crate::error::{AppError, Result};
use crate::port::{SchemaState, ScriptSource, TimeProvider, UpgradeStore, UpgradeTransaction};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Checker settings
#[derive(Debug, Clone, Default)]
pub struct UpgradeConfig {
    /// Copy the database here before upgrading (no copy when None)
    pub dump_dir: Option<PathBuf>,
    /// Version assumed for databases without a version table
    /// (defaults to the registry's base version)
    pub legacy_version: Option<Version>,
}

/// What `check()` did
#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeOutcome {
    UpToDate(Version),
    Installed { base: Version, to: Version },
    Upgraded { from: Version, to: Version, steps: usize },
}

/// A step as shown to operators before running it
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub accepts: (Version, Version),
    pub to: Version,
    pub rolling: bool,
    pub prepare_scripts: Vec<&'static str>,
    pub cleanup_scripts: Vec<&'static str>,
}

impl From<&Arc<dyn DbUpgrade>> for PlannedStep {
    fn from(step: &Arc<dyn DbUpgrade>) -> Self {
        Self {
            accepts: step.upgradable_range(),
            to: step.upgraded_version(),
            rolling: step.supports_rolling_upgrade(),
            prepare_scripts: step.prepare_scripts(),
            cleanup_scripts: step.cleanup_scripts(),
        }
    }
}

/// Dry-run view of an upgrade
#[derive(Debug, Clone)]
pub struct UpgradePlan {
    /// None for an empty database
    pub current: Option<Version>,
    pub target: Version,
    pub steps: Vec<PlannedStep>,
}

impl UpgradePlan {
    pub fn is_noop(&self) -> bool {
        self.current.is_some() && self.steps.is_empty()
    }
}

/// Brings the database schema up to the code version.
///
/// All steps run sequentially on the calling task, one transaction per
/// step. Any failure aborts the whole run; the version table then shows
/// where it stopped and an operator has to intervene.
pub struct DatabaseUpgradeChecker {
    store: Arc<dyn UpgradeStore>,
    scripts: Arc<dyn ScriptSource>,
    registry: Arc<UpgradeRegistry>,
    time_provider: Arc<dyn TimeProvider>,
    config: UpgradeConfig,
}

impl DatabaseUpgradeChecker {
    pub fn new(
        store: Arc<dyn UpgradeStore>,
        scripts: Arc<dyn ScriptSource>,
        registry: Arc<UpgradeRegistry>,
        time_provider: Arc<dyn TimeProvider>,
        config: UpgradeConfig,
    ) -> Self {
        Self {
            store,
            scripts,
            registry,
            time_provider,
            config,
        }
    }

    fn legacy_version(&self) -> Version {
        self.config
            .legacy_version
            .clone()
            .unwrap_or_else(|| self.registry.base_version().clone())
    }

    /// Version the database is at, `None` for an empty database
    ///
    /// # Errors
    /// - AppError::InvalidState if an earlier run stopped half way
    pub async fn current_version(&self) -> Result<Option<Version>> {
        match self.store.schema_state().await? {
            SchemaState::Empty => Ok(None),
            SchemaState::Unversioned => Ok(Some(self.legacy_version())),
            SchemaState::Versioned => {
                let history = self.store.version_history().await?;
                Ok(Some(
                    version_from_history(&history)?.unwrap_or_else(|| self.legacy_version()),
                ))
            }
        }
    }

    /// All rows of the version table, oldest first
    pub async fn history(&self) -> Result<Vec<VersionRecord>> {
        self.store.version_history().await
    }

    /// Work out what `check()` would run, without writing anything
    pub async fn plan(&self) -> Result<UpgradePlan> {
        let current = self.current_version().await?;
        let from = current
            .clone()
            .unwrap_or_else(|| self.registry.base_version().clone());

        let steps = self
            .steps_from(&from)?
            .map(|steps| steps.iter().map(PlannedStep::from).collect())
            .unwrap_or_default();

        Ok(UpgradePlan {
            current,
            target: self.registry.code_version().clone(),
            steps,
        })
    }

    /// Install or upgrade the schema so it matches the code version
    pub async fn check(&self) -> Result<UpgradeOutcome> {
        let code_version = self.registry.code_version().clone();

        let (current, installed) = match self.store.schema_state().await? {
            SchemaState::Empty => {
                self.install_base().await?;
                (self.registry.base_version().clone(), true)
            }
            SchemaState::Unversioned => {
                let legacy = self.legacy_version();
                info!(version = %legacy, "Database predates version tracking");
                self.store.ensure_version_table().await?;
                (legacy, false)
            }
            SchemaState::Versioned => {
                let history = self.store.version_history().await?;
                let current =
                    version_from_history(&history)?.unwrap_or_else(|| self.legacy_version());
                (current, false)
            }
        };

        info!(db_version = %current, code_version = %code_version, "Checking database version");

        let Some(steps) = self.steps_from(&current)? else {
            return Ok(if installed {
                UpgradeOutcome::Installed {
                    base: current,
                    to: code_version,
                }
            } else {
                UpgradeOutcome::UpToDate(code_version)
            });
        };

        self.upgrade(&current, steps).await?;

        Ok(if installed {
            UpgradeOutcome::Installed {
                base: current,
                to: code_version,
            }
        } else {
            UpgradeOutcome::Upgraded {
                from: current,
                to: code_version,
                steps: steps.len(),
            }
        })
    }

    /// `Ok(None)` when `from` is already the code version
    fn steps_from(&self, from: &Version) -> Result<Option<&[Arc<dyn DbUpgrade>]>> {
        let code_version = self.registry.code_version();

        if from == code_version {
            return Ok(None);
        }
        if from > code_version {
            return Err(AppError::InvalidState(format!(
                "database version {} is newer than code version {}",
                from, code_version
            )));
        }

        match self.registry.path_from(from)? {
            Some(steps) => Ok(Some(steps)),
            None => Err(AppError::Upgrade(format!(
                "no upgrade path from database version {} to {}",
                from, code_version
            ))),
        }
    }

    async fn upgrade(&self, from: &Version, steps: &[Arc<dyn DbUpgrade>]) -> Result<()> {
        info!(
            from = %from,
            to = %self.registry.code_version(),
            steps = steps.len(),
            "Upgrading database"
        );

        for step in steps.iter().filter(|s| !s.supports_rolling_upgrade()) {
            warn!(
                version = %step.upgraded_version(),
                "Step does not support rolling upgrade; stop all management servers first"
            );
        }

        if let Some(dir) = &self.config.dump_dir {
            self.dump(dir, from).await?;
        }

        for step in steps {
            self.apply_prepare(step.as_ref()).await?;
        }

        for step in steps {
            self.apply_cleanup(step.as_ref()).await?;
        }

        info!(version = %self.registry.code_version(), "Database upgrade complete");
        Ok(())
    }

    async fn install_base(&self) -> Result<()> {
        let base = self.registry.base_version().clone();
        info!(version = %base, "Empty database, installing base schema");

        let mut tx = self.store.begin().await?;
        let result = self.install_in(tx.as_mut(), &base).await;
        finish(tx, result, &base).await
    }

    async fn install_in(&self, tx: &mut dyn UpgradeTransaction, base: &Version) -> Result<()> {
        self.run_script(&mut *tx, self.registry.base_script()).await?;
        tx.record_step(base, UpgradeStep::Complete).await
    }

    async fn dump(&self, dir: &Path, version: &Version) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let file = dir.join(format!(
            "nimbus-{}-{}.db",
            version,
            self.time_provider.now_millis()
        ));

        info!(path = %file.display(), "Dumping database before upgrade");
        self.store.dump(&file).await?;

        let mut tx = self.store.begin().await?;
        let result = tx.record_step(version, UpgradeStep::Dump).await;
        finish(tx, result, version).await
    }

    async fn apply_prepare(&self, step: &dyn DbUpgrade) -> Result<()> {
        let version = step.upgraded_version();
        info!(version = %version, "Applying upgrade step");

        let mut tx = self.store.begin().await?;
        let result = self.prepare_in(tx.as_mut(), step, &version).await;
        finish(tx, result, &version).await
    }

    async fn prepare_in(
        &self,
        tx: &mut dyn UpgradeTransaction,
        step: &dyn DbUpgrade,
        version: &Version,
    ) -> Result<()> {
        for script in step.prepare_scripts() {
            self.run_script(&mut *tx, script).await?;
        }
        step.perform_data_migration(&mut *tx).await?;
        tx.record_step(version, UpgradeStep::Upgrade).await
    }

    async fn apply_cleanup(&self, step: &dyn DbUpgrade) -> Result<()> {
        let version = step.upgraded_version();

        let mut tx = self.store.begin().await?;
        let result = self.cleanup_in(tx.as_mut(), step, &version).await;
        finish(tx, result, &version).await
    }

    async fn cleanup_in(
        &self,
        tx: &mut dyn UpgradeTransaction,
        step: &dyn DbUpgrade,
        version: &Version,
    ) -> Result<()> {
        let scripts = step.cleanup_scripts();
        for script in &scripts {
            self.run_script(&mut *tx, script).await?;
        }
        if !scripts.is_empty() {
            tx.record_step(version, UpgradeStep::Cleanup).await?;
        }
        tx.record_step(version, UpgradeStep::Complete).await
    }

    async fn run_script(&self, tx: &mut dyn UpgradeTransaction, name: &str) -> Result<()> {
        let sql = self.scripts.load(name)?;
        info!(script = name, "Running upgrade script");
        tx.run_script(&sql)
            .await
            .map_err(|e| AppError::Upgrade(format!("script {} failed: {}", name, e)))
    }
}

/// Commit on success, roll back and surface the original error otherwise
async fn finish(
    tx: Box<dyn UpgradeTransaction>,
    result: Result<()>,
    version: &Version,
) -> Result<()> {
    match result {
        Ok(()) => tx.commit().await,
        Err(e) => {
            error!(version = %version, error = %e, "Upgrade step failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Highest completed version, or None if no step was ever committed
fn version_from_history(history: &[VersionRecord]) -> Result<Option<Version>> {
    let mut ordered: Vec<&VersionRecord> = history.iter().collect();
    ordered.sort_by_key(|r| r.id);

    // last step seen per version; suffixes don't matter for equality
    let mut last_step: BTreeMap<Version, UpgradeStep> = BTreeMap::new();
    for record in ordered.iter().filter(|r| r.step != UpgradeStep::Dump) {
        last_step.insert(record.version.clone(), record.step);
    }

    if let Some((version, step)) = last_step.iter().find(|(_, s)| s.is_in_progress()) {
        return Err(AppError::InvalidState(format!(
            "upgrade to {} stopped at step {}; restore the dump or finish it manually",
            version, step
        )));
    }

    // only dumps recorded: every step since rolled back
    if last_step.is_empty() {
        return Ok(None);
    }

    last_step
        .into_iter()
        .filter(|(_, step)| *step == UpgradeStep::Complete)
        .map(|(version, _)| version)
        .max()
        .map(Some)
        .ok_or_else(|| AppError::InvalidState("version table has no completed version".to_string()))
}

#[cfg(test)]
mod tests {
    use super::super::registry::tests::StubUpgrade;
    use super::*;
    use crate::port::Transaction;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Shared {
        state: SchemaState,
        events: Vec<String>,
        history: Vec<VersionRecord>,
    }

    struct FakeStore {
        shared: Arc<Mutex<Shared>>,
    }

    struct FakeTx {
        shared: Arc<Mutex<Shared>>,
        pending: Vec<(Version, UpgradeStep)>,
    }

    impl FakeStore {
        fn new(state: SchemaState, history: Vec<VersionRecord>) -> Self {
            Self {
                shared: Arc::new(Mutex::new(Shared {
                    state,
                    events: Vec::new(),
                    history,
                })),
            }
        }

        fn events(&self) -> Vec<String> {
            self.shared.lock().unwrap().events.clone()
        }

        fn recorded(&self) -> Vec<String> {
            self.shared
                .lock()
                .unwrap()
                .history
                .iter()
                .map(|r| format!("{} {}", r.version, r.step))
                .collect()
        }
    }

    #[async_trait]
    impl UpgradeStore for FakeStore {
        async fn schema_state(&self) -> Result<SchemaState> {
            Ok(self.shared.lock().unwrap().state)
        }

        async fn ensure_version_table(&self) -> Result<()> {
            let mut shared = self.shared.lock().unwrap();
            shared.events.push("ensure_version_table".to_string());
            shared.state = SchemaState::Versioned;
            Ok(())
        }

        async fn version_history(&self) -> Result<Vec<VersionRecord>> {
            Ok(self.shared.lock().unwrap().history.clone())
        }

        async fn dump(&self, destination: &Path) -> Result<()> {
            let name = destination.file_name().unwrap().to_string_lossy().to_string();
            self.shared.lock().unwrap().events.push(format!("dump {}", name));
            Ok(())
        }

        async fn begin(&self) -> Result<Box<dyn UpgradeTransaction>> {
            self.shared.lock().unwrap().events.push("begin".to_string());
            Ok(Box::new(FakeTx {
                shared: self.shared.clone(),
                pending: Vec::new(),
            }))
        }
    }

    #[async_trait]
    impl Transaction for FakeTx {
        async fn commit(self: Box<Self>) -> Result<()> {
            let FakeTx { shared, pending } = *self;
            let mut shared = shared.lock().unwrap();
            shared.events.push("commit".to_string());
            for (version, step) in pending {
                let id = shared.history.len() as i64 + 1;
                shared.history.push(VersionRecord {
                    id,
                    version,
                    updated: 0,
                    step,
                });
            }
            shared.state = SchemaState::Versioned;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.shared.lock().unwrap().events.push("rollback".to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl UpgradeTransaction for FakeTx {
        async fn run_script(&mut self, sql: &str) -> Result<()> {
            if sql.contains("BROKEN") {
                return Err(AppError::Database("syntax error".to_string()));
            }
            self.shared.lock().unwrap().events.push(format!("script {}", sql));
            Ok(())
        }

        async fn execute(&mut self, sql: &str) -> Result<u64> {
            self.shared.lock().unwrap().events.push(format!("exec {}", sql));
            Ok(1)
        }

        async fn query_i64(&mut self, _sql: &str) -> Result<Option<i64>> {
            Ok(None)
        }

        async fn column_exists(&mut self, _table: &str, _column: &str) -> Result<bool> {
            Ok(false)
        }

        async fn record_step(&mut self, version: &Version, step: UpgradeStep) -> Result<()> {
            self.pending.push((version.clone(), step));
            Ok(())
        }
    }

    struct MapScripts(HashMap<&'static str, &'static str>);

    impl ScriptSource for MapScripts {
        fn load(&self, name: &str) -> Result<String> {
            self.0
                .get(name)
                .map(|s| s.to_string())
                .ok_or_else(|| AppError::NotFound(format!("script {}", name)))
        }
    }

    struct FixedTime;

    impl TimeProvider for FixedTime {
        fn now_millis(&self) -> i64 {
            1_700_000_000_000
        }
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn record(id: i64, version: &str, step: UpgradeStep) -> VersionRecord {
        VersionRecord {
            id,
            version: v(version),
            updated: 0,
            step,
        }
    }

    fn scripts() -> Arc<MapScripts> {
        Arc::new(MapScripts(HashMap::from([
            ("create.sql", "CREATE base"),
            ("up-11.sql", "ALTER 1.1"),
            ("up-12.sql", "ALTER 1.2"),
            ("clean-11.sql", "DROP 1.1"),
            ("broken.sql", "BROKEN"),
        ])))
    }

    fn registry() -> UpgradeRegistry {
        let mut first = StubUpgrade::new("1.0.0", "1.0.1", "1.1.0");
        first.prepare = vec!["up-11.sql"];
        first.cleanup = vec!["clean-11.sql"];
        let mut second = StubUpgrade::new("1.1.0", "1.1.0", "1.2.0");
        second.prepare = vec!["up-12.sql"];
        second.rolling = true;

        let first: Arc<dyn DbUpgrade> = Arc::new(first);
        let second: Arc<dyn DbUpgrade> = Arc::new(second);

        UpgradeRegistry::new(v("1.0.0"), "create.sql", v("1.2.0"))
            .register(v("1.0.0"), vec![first.clone(), second.clone()])
            .register(v("1.1.0"), vec![second])
    }

    fn checker(store: Arc<FakeStore>, config: UpgradeConfig) -> DatabaseUpgradeChecker {
        DatabaseUpgradeChecker::new(
            store,
            scripts(),
            Arc::new(registry()),
            Arc::new(FixedTime),
            config,
        )
    }

    #[tokio::test]
    async fn test_fresh_install_runs_base_then_upgrades() {
        let store = Arc::new(FakeStore::new(SchemaState::Empty, vec![]));
        let outcome = checker(store.clone(), UpgradeConfig::default())
            .check()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpgradeOutcome::Installed {
                base: v("1.0.0"),
                to: v("1.2.0")
            }
        );
        assert_eq!(store.events()[..3], ["begin", "script CREATE base", "commit"]);
        assert_eq!(
            store.recorded(),
            [
                "1.0.0 Complete",
                "1.1.0 Upgrade",
                "1.2.0 Upgrade",
                "1.1.0 Cleanup",
                "1.1.0 Complete",
                "1.2.0 Complete"
            ]
        );
    }

    #[tokio::test]
    async fn test_prepare_phase_runs_before_any_cleanup() {
        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![record(1, "1.0.0", UpgradeStep::Complete)],
        ));
        let outcome = checker(store.clone(), UpgradeConfig::default())
            .check()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UpgradeOutcome::Upgraded {
                from: v("1.0.0"),
                to: v("1.2.0"),
                steps: 2
            }
        );
        assert_eq!(
            store.events(),
            [
                "begin",
                "script ALTER 1.1",
                "exec -- migrate to 1.1.0",
                "commit",
                "begin",
                "script ALTER 1.2",
                "exec -- migrate to 1.2.0",
                "commit",
                "begin",
                "script DROP 1.1",
                "commit",
                "begin",
                "commit",
            ]
        );
    }

    #[tokio::test]
    async fn test_up_to_date_does_nothing() {
        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![
                record(1, "1.0.0", UpgradeStep::Complete),
                record(2, "1.2.0", UpgradeStep::Upgrade),
                record(3, "1.2.0", UpgradeStep::Complete),
            ],
        ));
        let outcome = checker(store.clone(), UpgradeConfig::default())
            .check()
            .await
            .unwrap();

        assert_eq!(outcome, UpgradeOutcome::UpToDate(v("1.2.0")));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_newer_database_is_rejected() {
        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![record(1, "2.0.0", UpgradeStep::Complete)],
        ));
        let err = tokio_test::assert_err!(checker(store, UpgradeConfig::default()).check().await);

        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(err.to_string().contains("newer than code"));
    }

    #[tokio::test]
    async fn test_unknown_version_has_no_path() {
        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![record(1, "1.0.5", UpgradeStep::Complete)],
        ));
        let err = tokio_test::assert_err!(checker(store, UpgradeConfig::default()).check().await);

        assert!(matches!(err, AppError::Upgrade(_)));
    }

    #[tokio::test]
    async fn test_failed_step_rolls_back_and_aborts() {
        let mut first = StubUpgrade::new("1.0.0", "1.0.0", "1.1.0");
        first.prepare = vec!["up-11.sql"];
        let mut second = StubUpgrade::new("1.1.0", "1.1.0", "1.2.0");
        second.fail_migration = true;
        let registry = UpgradeRegistry::new(v("1.0.0"), "create.sql", v("1.2.0"))
            .register(v("1.0.0"), vec![Arc::new(first), Arc::new(second)]);

        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![record(1, "1.0.0", UpgradeStep::Complete)],
        ));
        let checker = DatabaseUpgradeChecker::new(
            store.clone(),
            scripts(),
            Arc::new(registry),
            Arc::new(FixedTime),
            UpgradeConfig::default(),
        );

        let err = checker.check().await.unwrap_err();
        assert!(err.to_string().contains("constraint failed"));

        let events = store.events();
        assert_eq!(events.last().map(String::as_str), Some("rollback"));
        assert_eq!(events.iter().filter(|e| *e == "commit").count(), 1);
        assert_eq!(store.recorded(), ["1.0.0 Complete", "1.1.0 Upgrade"]);

        // the half-finished run is detected on the next start
        let err = checker.current_version().await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(err.to_string().contains("1.1.0"));
    }

    #[tokio::test]
    async fn test_script_failure_names_the_script() {
        let mut broken = StubUpgrade::new("1.1.0", "1.1.0", "1.2.0");
        broken.prepare = vec!["broken.sql"];
        let registry = UpgradeRegistry::new(v("1.0.0"), "create.sql", v("1.2.0"))
            .register(v("1.1.0"), vec![Arc::new(broken)]);
        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![record(1, "1.1.0", UpgradeStep::Complete)],
        ));
        let checker = DatabaseUpgradeChecker::new(
            store.clone(),
            scripts(),
            Arc::new(registry),
            Arc::new(FixedTime),
            UpgradeConfig::default(),
        );

        let err = checker.check().await.unwrap_err();
        assert!(err.to_string().contains("broken.sql"));
        assert_eq!(store.events(), ["begin", "rollback"]);
    }

    #[tokio::test]
    async fn test_dump_recorded_before_upgrade() {
        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![record(1, "1.1.0", UpgradeStep::Complete)],
        ));
        let config = UpgradeConfig {
            dump_dir: Some(std::env::temp_dir().join("nimbus-checker-dump-test")),
            legacy_version: None,
        };
        checker(store.clone(), config).check().await.unwrap();

        let events = store.events();
        assert_eq!(events[0], "dump nimbus-1.1.0-1700000000000.db");
        assert_eq!(
            store.recorded(),
            ["1.1.0 Complete", "1.1.0 Dump", "1.2.0 Upgrade", "1.2.0 Complete"]
        );
    }

    #[tokio::test]
    async fn test_unversioned_database_uses_legacy_version() {
        let store = Arc::new(FakeStore::new(SchemaState::Unversioned, vec![]));
        let config = UpgradeConfig {
            dump_dir: None,
            legacy_version: Some(v("1.1.0")),
        };
        let outcome = checker(store.clone(), config).check().await.unwrap();

        assert_eq!(store.events()[0], "ensure_version_table");
        assert_eq!(
            outcome,
            UpgradeOutcome::Upgraded {
                from: v("1.1.0"),
                to: v("1.2.0"),
                steps: 1
            }
        );
    }

    #[tokio::test]
    async fn test_plan_writes_nothing() {
        let store = Arc::new(FakeStore::new(SchemaState::Empty, vec![]));
        let plan = checker(store.clone(), UpgradeConfig::default())
            .plan()
            .await
            .unwrap();

        assert!(plan.current.is_none());
        assert!(!plan.is_noop());
        assert_eq!(plan.target, v("1.2.0"));
        let targets: Vec<String> = plan.steps.iter().map(|s| s.to.to_string()).collect();
        assert_eq!(targets, ["1.1.0", "1.2.0"]);
        assert!(!plan.steps[0].rolling);
        assert_eq!(plan.steps[0].cleanup_scripts, ["clean-11.sql"]);
        assert!(store.events().is_empty());
    }

    #[test]
    fn test_history_ignores_dump_rows() {
        let history = vec![
            record(1, "1.0.0", UpgradeStep::Complete),
            record(2, "1.0.0", UpgradeStep::Dump),
        ];
        assert_eq!(version_from_history(&history).unwrap(), Some(v("1.0.0")));
        assert_eq!(version_from_history(&[]).unwrap(), None);
    }

    #[test]
    fn test_dump_only_history_has_no_version() {
        let history = vec![record(1, "1.0.0", UpgradeStep::Dump)];
        assert_eq!(version_from_history(&history).unwrap(), None);
    }

    #[tokio::test]
    async fn test_rerun_after_rolled_back_first_step_uses_legacy_version() {
        // a dump was committed, then the first step failed and rolled back
        let store = Arc::new(FakeStore::new(
            SchemaState::Versioned,
            vec![record(1, "1.0.0", UpgradeStep::Dump)],
        ));
        let checker = checker(store.clone(), UpgradeConfig::default());

        assert_eq!(checker.current_version().await.unwrap(), Some(v("1.0.0")));
        let outcome = checker.check().await.unwrap();
        assert_eq!(
            outcome,
            UpgradeOutcome::Upgraded {
                from: v("1.0.0"),
                to: v("1.2.0"),
                steps: 2
            }
        );
        assert_eq!(store.recorded().last().unwrap(), "1.2.0 Complete");
    }

    #[test]
    fn test_cleanup_interrupted_is_detected() {
        let history = vec![
            record(1, "1.0.0", UpgradeStep::Complete),
            record(2, "1.1.0", UpgradeStep::Upgrade),
            record(3, "1.2.0", UpgradeStep::Upgrade),
            record(4, "1.1.0", UpgradeStep::Cleanup),
            record(5, "1.1.0", UpgradeStep::Complete),
        ];
        let err = version_from_history(&history).unwrap_err();
        assert!(err.to_string().contains("1.2.0"));
    }
}
