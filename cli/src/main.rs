use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

use commands::{
    balance::BalanceArgs, check::CheckArgs, endpoints::EndpointsArgs, limits::LimitsArgs,
    transfer::TransferArgs, tx::TxArgs,
};
use settings::Session;

#[derive(Parser)]
#[command(name = "ledger-gateway")]
#[command(about = "Query and transact on Solana through a pool of RPC endpoints", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the gateway config file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Path to signer keypair file
    #[arg(long, short = 'k', global = true)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured endpoints and their health
    Endpoints(EndpointsArgs),

    /// Show native and tracked token balances of an address
    Balance(BalanceArgs),

    /// Look up a transaction
    Tx(TxArgs),

    /// Check whether a transaction has landed on any endpoint
    Check(CheckArgs),

    /// Transfer SPL tokens from the signer and wait for finalization
    Transfer(TransferArgs),

    /// Show rate limiter settings and counters
    Limits(LimitsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(settings::default_config_path);
    let session = Session::open(&config_path, cli.keypair)?;

    match cli.command {
        Commands::Endpoints(args) => commands::endpoints::execute(&session, args).await,
        Commands::Balance(args) => commands::balance::execute(&session, args).await,
        Commands::Tx(args) => commands::tx::execute(&session, args).await,
        Commands::Check(args) => commands::check::execute(&session, args).await,
        Commands::Transfer(args) => commands::transfer::execute(&session, args).await,
        Commands::Limits(args) => commands::limits::execute(&session, args).await,
    }
}
