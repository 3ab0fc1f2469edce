// Upgrade Registry - version -> ordered list of upgrade steps

use super::db_upgrade::DbUpgrade;
use crate::domain::Version;
use crate::error::{AppError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps every supported database version to the ordered steps that bring
/// it to the code version.
pub struct UpgradeRegistry {
    code_version: Version,
    base_version: Version,
    base_script: &'static str,
    paths: BTreeMap<Version, Vec<Arc<dyn DbUpgrade>>>,
}

impl UpgradeRegistry {
    /// # Arguments
    /// * `base_version` - version created by `base_script` on a fresh install
    /// * `base_script` - script name creating the initial schema
    /// * `code_version` - version every path must end on
    pub fn new(base_version: Version, base_script: &'static str, code_version: Version) -> Self {
        Self {
            code_version,
            base_version,
            base_script,
            paths: BTreeMap::new(),
        }
    }

    /// Register the upgrade path for databases at `from`
    pub fn register(mut self, from: Version, steps: Vec<Arc<dyn DbUpgrade>>) -> Self {
        self.paths.insert(from, steps);
        self
    }

    pub fn code_version(&self) -> &Version {
        &self.code_version
    }

    pub fn base_version(&self) -> &Version {
        &self.base_version
    }

    pub fn base_script(&self) -> &'static str {
        self.base_script
    }

    /// Versions that have a registered path, ascending
    pub fn known_versions(&self) -> impl Iterator<Item = &Version> {
        self.paths.keys()
    }

    /// Look up and validate the path for a database at `from`
    ///
    /// Returns `Ok(None)` if no path is registered. A registered path must
    /// chain: every step's range contains the version the previous step
    /// produced, and the last step lands on the code version.
    pub fn path_from(&self, from: &Version) -> Result<Option<&[Arc<dyn DbUpgrade>]>> {
        let Some(steps) = self.paths.get(from) else {
            return Ok(None);
        };

        let mut running = from.clone();
        for step in steps {
            let (low, high) = step.upgradable_range();
            if !running.within(&low, &high) {
                return Err(AppError::Upgrade(format!(
                    "step to {} accepts {}..={} but database would be at {}",
                    step.upgraded_version(),
                    low,
                    high,
                    running
                )));
            }
            running = step.upgraded_version();
        }

        if running != self.code_version {
            return Err(AppError::Upgrade(format!(
                "path from {} ends at {}, code is at {}",
                from, running, self.code_version
            )));
        }

        Ok(Some(steps.as_slice()))
    }
}
