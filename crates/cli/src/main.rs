//! Nimbus CLI - talk to OVM host agents and manage the Nimbus schema

mod agent;
mod db;
mod settings;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use settings::{LogFormat, Settings};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "OVM agent client and schema upgrader", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ~/.nimbus/config.toml)
    #[arg(long, global = true, env = "NIMBUS_CONFIG")]
    config: Option<PathBuf>,

    /// Log format: pretty or json
    #[arg(long, global = true, env = "NIMBUS_LOG_FORMAT")]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Call an OVM host agent
    Agent {
        #[command(flatten)]
        target: AgentArgs,

        #[command(subcommand)]
        command: agent::AgentCommand,
    },

    /// Inspect or upgrade the database schema
    Db {
        /// Database URL or path
        #[arg(long, env = "NIMBUS_DATABASE_URL")]
        url: Option<String>,

        #[command(subcommand)]
        command: db::DbCommand,
    },
}

/// Flags overriding the `[agent]` configuration section
#[derive(Args, Debug)]
struct AgentArgs {
    /// Agent host name or IP
    #[arg(long)]
    host: Option<String>,

    /// Agent port
    #[arg(long)]
    port: Option<u16>,

    /// Agent user
    #[arg(long)]
    username: Option<String>,

    /// Agent password
    #[arg(long, env = "NIMBUS_AGENT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Call timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl AgentArgs {
    fn apply(self, settings: &mut Settings) {
        let agent = &mut settings.agent;
        if let Some(host) = self.host {
            agent.host = host;
        }
        if let Some(port) = self.port {
            agent.port = port;
        }
        if let Some(username) = self.username {
            agent.username = username;
        }
        if let Some(password) = self.password {
            agent.password = password;
        }
        if let Some(timeout) = self.timeout {
            agent.timeout_secs = timeout;
        }
    }
}

/// Install the global subscriber. The guard keeps the file writer alive.
fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("nimbus=info"))
        .context("Failed to create env filter")?;

    let mut layers: Vec<telemetry::BoxedLayer> = Vec::new();

    // stdout carries command output, logs go to stderr
    match settings.log.format {
        // Production: JSON structured logging
        LogFormat::Json => layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed()),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => layers.push(fmt::layer().pretty().with_writer(std::io::stderr).boxed()),
    }

    let mut guard = None;
    if let Some(dir) = settings.log.directory() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let (writer, worker) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "nimbus.log"));
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
        guard = Some(worker);
    }

    if let Some(otel) = telemetry::layer()? {
        layers.push(otel);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

async fn run(cli: Cli, mut settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Agent { target, command } => {
            target.apply(&mut settings);
            agent::run(&settings.agent, command).await
        }
        Commands::Db { url, command } => {
            if let Some(url) = url {
                settings.database.url = url;
            }
            db::run(&settings.database, command).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut settings = match settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(2);
        }
    };
    if let Some(format) = cli.log_format.as_deref() {
        settings.log.format = match format {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
    }

    let _guard = match init_logging(&settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(2);
        }
    };

    tracing::debug!(version = nimbus_core::VERSION, "nimbus starting");

    let result = run(cli, settings).await;
    telemetry::shutdown();

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
