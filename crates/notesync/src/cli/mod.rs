//! Command dispatch.

mod args;
mod replay;
mod script;

use std::path::{Path, PathBuf};

use clap::Parser;
use notesync_core::{ConfigError, EngineConfig};
use thiserror::Error;

use args::{Cli, Commands};

/// Errors that abort a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid script: {0}")]
    Script(#[from] toml::de::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to render summary: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

pub fn run_cli() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match EngineConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Replay { script, json } => handle_replay(&config, &script, json),
        Commands::Config => handle_config(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn handle_replay(config: &EngineConfig, script_path: &Path, json: bool) -> Result<(), CliError> {
    let script = script::Script::load(script_path)?;
    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let summary = runtime.block_on(replay::run(config.clone(), script));

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print();
    }
    Ok(())
}

fn handle_config(config: &EngineConfig) -> Result<(), CliError> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
