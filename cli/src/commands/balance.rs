use anyhow::{Context, Result};
use clap::Args;
use ledger_gateway_client::LedgerReadApi;

use super::parse_pubkey;
use crate::settings::Session;

#[derive(Args)]
pub struct BalanceArgs {
    /// Address to query (defaults to the signer)
    address: Option<String>,

    /// Print the balance as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(session: &Session, args: BalanceArgs) -> Result<()> {
    let address = match &args.address {
        Some(address) => parse_pubkey(address, "wallet")?,
        None => session.signer().await?,
    };

    let balance = session
        .gateway
        .get_balance(&address)
        .await
        .with_context(|| format!("Failed to fetch balance of {}", address))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&balance)?);
        return Ok(());
    }

    println!("Address: {}", balance.address);
    println!("  SOL: {} ({} lamports)", balance.sol, balance.lamports);
    for token in &balance.tokens {
        println!("  {}: {} ({} base units)", token.mint, token.ui_amount, token.amount);
    }

    Ok(())
}
