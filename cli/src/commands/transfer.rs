use anyhow::{Context, Result};
use clap::Args;
use ledger_gateway_client::{TransferApi, USDC_MINT};

use super::parse_pubkey;
use crate::settings::Session;

#[derive(Args)]
pub struct TransferArgs {
    /// Recipient wallet address
    #[arg(long, short = 't')]
    to: String,

    /// Amount in UI units, e.g. 1.5
    #[arg(long, short = 'a')]
    amount: f64,

    /// Token mint address (defaults to USDC)
    #[arg(long, short = 'm')]
    mint: Option<String>,

    /// Poll every endpoint for the receipt after finalization
    #[arg(long)]
    verify: bool,
}

pub async fn execute(session: &Session, args: TransferArgs) -> Result<()> {
    let to = parse_pubkey(&args.to, "recipient")?;
    let mint = match &args.mint {
        Some(mint) => parse_pubkey(mint, "mint")?,
        None => USDC_MINT,
    };
    let from = session.signer().await?;

    println!("Transferring {} of {} from {} to {}", args.amount, mint, from, to);

    if args.verify {
        let (signature, receipt) = session
            .gateway
            .send_and_verify_spl_token(&to, args.amount, &from, &mint)
            .await
            .context("Transfer failed")?;
        println!("Signature: {}", signature);
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        let signature = session
            .gateway
            .send_spl_token(&to, args.amount, &from, &mint)
            .await
            .context("Transfer failed")?;
        println!("Signature: {}", signature);
    }

    Ok(())
}
