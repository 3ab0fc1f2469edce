//! `nimbus db ...` commands

use crate::settings::DatabaseSettings;
use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use nimbus_core::application::{DatabaseUpgradeChecker, UpgradeConfig, UpgradeOutcome};
use nimbus_core::domain::{Version, VersionRecord};
use nimbus_core::port::SystemTimeProvider;
use nimbus_infra_sqlite::{create_pool, registry, ScriptResolver, SqliteUpgradeStore};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Show the schema version and the version table
    Status,

    /// Show the steps an upgrade would run, without running them
    Plan,

    /// Install or upgrade the schema to the version this build expects
    Upgrade {
        /// Copy the database here first
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Updated (UTC)")]
    updated: String,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Accepts")]
    accepts: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Rolling")]
    rolling: String,
    #[tabled(rename = "Prepare")]
    prepare: String,
    #[tabled(rename = "Cleanup")]
    cleanup: String,
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Make sure the directory holding a file database exists
fn ensure_parent_dir(url: &str) -> Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Version table followed by the schema version, or the reason it is unknown
fn status_report(
    history: Vec<VersionRecord>,
    current: &nimbus_core::Result<Option<Version>>,
) -> String {
    let mut out = String::new();

    if history.is_empty() {
        out.push_str(&"No version history recorded".yellow().to_string());
    } else {
        let rows: Vec<HistoryRow> = history
            .into_iter()
            .map(|r| HistoryRow {
                id: r.id,
                version: r.version.to_string(),
                step: r.step.to_string(),
                updated: format_millis(r.updated),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        out.push_str(&table.to_string());
    }
    out.push_str("\n\n");

    let schema = match current {
        Ok(Some(version)) => version.to_string(),
        Ok(None) => "empty database".yellow().to_string(),
        Err(e) => e.to_string().red().bold().to_string(),
    };
    out.push_str(&format!("{} {}\n", "Schema version:".bold(), schema));
    out.push_str(&format!("{} {}", "Code version:".bold(), registry().code_version()));
    out
}

async fn checker(settings: &DatabaseSettings, dump_dir: Option<PathBuf>) -> Result<DatabaseUpgradeChecker> {
    let url = settings.database_url();
    ensure_parent_dir(&url)?;
    info!(url = %url, "Opening database");

    let pool = create_pool(&url)
        .await
        .with_context(|| format!("Failed to open database {}", url))?;

    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteUpgradeStore::new(pool, time_provider.clone()));
    let scripts = Arc::new(match settings.scripts_dir() {
        Some(dir) => ScriptResolver::with_override_dir(dir),
        None => ScriptResolver::embedded(),
    });

    let config = UpgradeConfig {
        dump_dir: dump_dir.or_else(|| settings.dump_dir()),
        legacy_version: settings.legacy_version()?,
    };

    Ok(DatabaseUpgradeChecker::new(
        store,
        scripts,
        Arc::new(registry()),
        time_provider,
        config,
    ))
}

pub async fn run(settings: &DatabaseSettings, command: DbCommand) -> Result<()> {
    match command {
        DbCommand::Status => {
            let checker = checker(settings, None).await?;
            // history first: it is what an operator needs after an interrupted run
            let history = checker.history().await?;
            let current = checker.current_version().await;
            println!("{}", status_report(history, &current));
            current?;
        }

        DbCommand::Plan => {
            let plan = checker(settings, None).await?.plan().await?;
            let from = plan
                .current
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "empty".to_string());

            if plan.is_noop() {
                println!("{}", format!("✓ Schema is at {}, nothing to do", plan.target).green().bold());
                return Ok(());
            }

            println!("{} {} → {}", "Upgrade:".bold(), from, plan.target);
            if plan.current.is_none() {
                println!("  {} install base schema first", "•".bold());
            }
            let rows: Vec<StepRow> = plan
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| StepRow {
                    index: i + 1,
                    accepts: format!("{} - {}", s.accepts.0, s.accepts.1),
                    to: s.to.to_string(),
                    rolling: if s.rolling { "yes" } else { "no" }.to_string(),
                    prepare: s.prepare_scripts.join("\n"),
                    cleanup: s.cleanup_scripts.join("\n"),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{}", table);

            if plan.steps.iter().any(|s| !s.rolling) {
                println!(
                    "{}",
                    "Stop all management servers before upgrading: some steps are not rolling"
                        .yellow()
                );
            }
        }

        DbCommand::Upgrade { dump_dir } => {
            let outcome = checker(settings, dump_dir).await?.check().await?;
            match outcome {
                UpgradeOutcome::UpToDate(version) => {
                    println!("{}", format!("✓ Schema already at {}", version).green().bold());
                }
                UpgradeOutcome::Installed { base, to } => {
                    println!(
                        "{}",
                        format!("✓ Installed schema {} and upgraded to {}", base, to)
                            .green()
                            .bold()
                    );
                }
                UpgradeOutcome::Upgraded { from, to, steps } => {
                    println!(
                        "{}",
                        format!("✓ Upgraded schema {} → {} ({} steps)", from, to, steps)
                            .green()
                            .bold()
                    );
                }
            }
        }
    }

    Ok(())
}
