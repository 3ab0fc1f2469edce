//! Settings: built-in defaults, then the TOML file, then `NIMBUS__SECTION__KEY`
//! environment variables. Command-line flags are applied on top by the caller.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use nimbus_core::domain::Version;
use nimbus_ovm::ConnectionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "~/.nimbus/config.toml";
pub const DEFAULT_DB_PATH: &str = "~/.nimbus/nimbus.db";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub agent: ConnectionConfig,
    pub database: DatabaseSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    /// Directory whose scripts replace the embedded ones
    pub scripts_dir: Option<String>,
    /// Copy the database here before upgrading
    pub dump_dir: Option<String>,
    /// Version assumed for databases without a version table
    pub legacy_version: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DB_PATH.to_string(),
            scripts_dir: None,
            dump_dir: None,
            legacy_version: None,
        }
    }
}

impl DatabaseSettings {
    /// sqlx URL with `~` expanded
    pub fn database_url(&self) -> String {
        let raw = self.url.trim();
        let path = raw
            .strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
            .unwrap_or(raw);
        if path.starts_with(":memory:") {
            return format!("sqlite:{}", path);
        }
        format!("sqlite://{}", shellexpand::tilde(path))
    }

    pub fn scripts_dir(&self) -> Option<PathBuf> {
        self.scripts_dir.as_deref().map(expand)
    }

    pub fn dump_dir(&self) -> Option<PathBuf> {
        self.dump_dir.as_deref().map(expand)
    }

    pub fn legacy_version(&self) -> Result<Option<Version>> {
        self.legacy_version
            .as_deref()
            .map(|v| {
                v.parse::<Version>()
                    .with_context(|| format!("database.legacy_version {:?}", v))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Daily rolling JSON log files go here when set
    pub directory: Option<String>,
}

impl LogSettings {
    pub fn directory(&self) -> Option<PathBuf> {
        self.directory.as_deref().map(expand)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load settings. An explicit `path` must exist; the default file is optional.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::from(expand(DEFAULT_CONFIG_PATH)).required(false),
    };

    Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("NIMBUS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}
