use anyhow::Result;
use clap::Args;
use ledger_gateway_client::DiagnosticsApi;

use super::parse_signature;
use crate::settings::Session;

#[derive(Args)]
pub struct CheckArgs {
    /// Transaction signature
    signature: String,
}

pub async fn execute(session: &Session, args: CheckArgs) -> Result<()> {
    let signature = parse_signature(&args.signature)?;
    let receipt = session.gateway.check_received(&signature).await;

    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}
