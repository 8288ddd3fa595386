//! Huntsync - relay probe and configuration tool
//!
//! `huntsync probe` runs the same startup gate the plugin runs and reports
//! what the relay answered; `huntsync config` prints the effective
//! configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use huntsync::{check_relay, logging};
use huntsync_core::SyncConfig;
use huntsync_net::{HttpTransport, RelayClient};

#[derive(Debug, Parser)]
#[command(name = "huntsync", version, about = "Session relay client for shared combat state")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the relay is reachable and compatible
    Probe {
        /// Relay base URL, overriding the config file
        #[arg(long)]
        relay: Option<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Config => match config.to_toml() {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Failed to render configuration: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Probe { relay } => {
            let mut config = config;
            if let Some(url) = relay {
                config.relay_url = url.trim_end_matches('/').to_string();
            }
            probe(&config).await
        }
    }
}

fn load_config(path: Option<PathBuf>) -> huntsync_core::Result<SyncConfig> {
    let path = match path {
        Some(path) => path,
        None => SyncConfig::default_path()?,
    };
    SyncConfig::load(&path)
}

async fn probe(config: &SyncConfig) -> ExitCode {
    let transport = match HttpTransport::new(config.request_timeout()) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let relay = RelayClient::new(transport, config.relay_url.clone());

    match check_relay(&relay, config).await {
        Ok(report) => {
            let version = relay.version().await;
            println!("relay:    {}", relay.base_url());
            println!("attempts: {}", report.attempts);
            if version.is_ok() {
                println!("version:  {}", version.value);
            } else {
                println!("version:  unavailable ({})", version.status);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Relay check failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
