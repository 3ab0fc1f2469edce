// Upgrade script resolution
// Scripts ship inside the binary; an override directory can replace any of them

use nimbus_core::error::{AppError, Result};
use nimbus_core::port::ScriptSource;
use std::path::PathBuf;
use tracing::debug;

const EMBEDDED: &[(&str, &str)] = &[
    ("create-schema.sql", include_str!("../migrations/create-schema.sql")),
    ("schema-400to410.sql", include_str!("../migrations/schema-400to410.sql")),
    (
        "schema-400to410-cleanup.sql",
        include_str!("../migrations/schema-400to410-cleanup.sql"),
    ),
    ("schema-410to420.sql", include_str!("../migrations/schema-410to420.sql")),
    (
        "schema-410to420-cleanup.sql",
        include_str!("../migrations/schema-410to420-cleanup.sql"),
    ),
    ("schema-420to430.sql", include_str!("../migrations/schema-420to430.sql")),
];

#[derive(Debug, Clone, Default)]
pub struct ScriptResolver {
    override_dir: Option<PathBuf>,
}

impl ScriptResolver {
    /// Embedded scripts only
    pub fn embedded() -> Self {
        Self::default()
    }

    /// Look in `dir` first, fall back to the embedded scripts
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    /// Names of every embedded script
    pub fn names() -> impl Iterator<Item = &'static str> {
        EMBEDDED.iter().map(|(name, _)| *name)
    }
}

impl ScriptSource for ScriptResolver {
    fn load(&self, name: &str) -> Result<String> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(AppError::Validation(format!(
                "invalid script name: {}",
                name
            )));
        }

        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                debug!(path = %path.display(), "Using script override");
                return Ok(std::fs::read_to_string(path)?);
            }
        }

        EMBEDDED
            .iter()
            .find(|(embedded, _)| *embedded == name)
            .map(|(_, sql)| sql.to_string())
            .ok_or_else(|| AppError::NotFound(format!("upgrade script {}", name)))
    }
}
