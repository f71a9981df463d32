//! Agora CLI: runs governance operations against a local LMDB store.

mod commands;
mod config;
mod journal;
mod oracle;

use std::path::PathBuf;
use std::process::ExitCode;

use agora_governance::{ErrorClass, GovernanceError};
use agora_types::Timestamp;
use agora_utils::LogFormat;
use anyhow::Context;
use clap::Parser;

use commands::Command;
use config::AgoraConfig;

#[derive(Parser)]
#[command(name = "agora", about = "Token-weighted governance engine", version)]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the LMDB store.
    #[arg(long, env = "AGORA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// TOML file of balance snapshots.
    #[arg(long, env = "AGORA_BALANCES")]
    balances: Option<PathBuf>,

    /// JSON-lines journal receiving every state delta.
    #[arg(long, env = "AGORA_JOURNAL")]
    journal: Option<PathBuf>,

    /// JSON-lines outbox receiving extension proposal effects.
    #[arg(long, env = "AGORA_EFFECTS")]
    effects: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[arg(long, env = "AGORA_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "AGORA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Treat this Unix time (seconds) as "now" instead of the system clock.
    #[arg(long, env = "AGORA_NOW")]
    now: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Merge file configuration (or defaults) with CLI flags and env vars.
    fn resolve_config(&self) -> anyhow::Result<AgoraConfig> {
        let mut config = match &self.config {
            Some(path) => AgoraConfig::from_toml_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => AgoraConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(path) = &self.balances {
            config.balances_file = path.clone();
        }
        if let Some(path) = &self.journal {
            config.journal_file = path.clone();
        }
        if let Some(path) = &self.effects {
            config.effects_file = path.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format.to_string();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;
    let format: LogFormat = config.log_format.parse()?;
    agora_utils::init_logging(format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    let now = cli.now.map(Timestamp::new).unwrap_or_else(Timestamp::now);
    let engine = commands::open_engine(&config, now)?;
    let output = commands::run(&engine, cli.command, now)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            match e.downcast_ref::<GovernanceError>().map(GovernanceError::class) {
                Some(ErrorClass::Precondition) => ExitCode::from(2),
                Some(ErrorClass::Infrastructure) => ExitCode::from(3),
                None => ExitCode::FAILURE,
            }
        }
    }
}
