//! mailu-operator - Keeps a Mailu server in sync with a declared manifest
//!
//! Domains, mailboxes and aliases declared in a YAML manifest are created,
//! updated and deleted through the Mailu admin API. `apply` reconciles once
//! and reports the result; `run` keeps reconciling until interrupted.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;
mod manifest;

use config::OperatorConfig;
use error::OperatorResult;

/// mailu-operator - Declarative management of Mailu domains, mailboxes and aliases
#[derive(Parser)]
#[command(name = "mailu-operator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every object in a manifest once
    Apply(commands::apply::ApplyArgs),

    /// Keep a manifest reconciled until Ctrl-C
    Run(commands::run::RunArgs),
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so `apply --json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,mailu_reconcile=debug,mailu_client=debug")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> OperatorResult<()> {
    let config = OperatorConfig::from_env()?;
    tracing::debug!(config = ?config, "Loaded configuration");

    match cli.command {
        Commands::Apply(args) => commands::apply::execute(args, config).await,
        Commands::Run(args) => commands::run::execute(args, config).await,
    }
}
