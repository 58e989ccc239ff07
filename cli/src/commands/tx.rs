use anyhow::{Context, Result};
use clap::Args;
use ledger_gateway_client::{DiagnosticsApi, LedgerReadApi};

use super::parse_signature;
use crate::settings::Session;

#[derive(Args)]
pub struct TxArgs {
    /// Transaction signature
    signature: String,

    /// Ask this endpoint only instead of the pool
    #[arg(long, short = 'e')]
    endpoint: Option<String>,
}

pub async fn execute(session: &Session, args: TxArgs) -> Result<()> {
    let signature = parse_signature(&args.signature)?;

    let record = match &args.endpoint {
        Some(url) => session
            .gateway
            .get_transaction_from_endpoint(&signature, url)
            .await
            .with_context(|| format!("Lookup on {} failed", url))?,
        None => session
            .gateway
            .get_transaction_data(&signature)
            .await
            .context("Transaction lookup failed")?,
    };

    let Some(record) = record else {
        println!("Transaction {} not found", signature);
        return Ok(());
    };

    println!("Transaction {}", record.signature);
    println!("  Slot:   {}", record.slot);
    if let Some(time) = record.block_time {
        println!("  Time:   {}", time);
    }
    if let Some(fee) = record.fee {
        println!("  Fee:    {} lamports", fee);
    }
    match &record.err {
        Some(err) => println!("  Status: failed ({})", err),
        None => println!("  Status: success"),
    }
    if !record.log_messages.is_empty() {
        println!("  Logs:");
        for line in &record.log_messages {
            println!("    {}", line);
        }
    }

    Ok(())
}
