use anyhow::Result;
use clap::Args;
use ledger_gateway_client::{DiagnosticsApi, TokenBucket};

use crate::settings::Session;

#[derive(Args)]
pub struct LimitsArgs {
    /// Print counters as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(session: &Session, args: LimitsArgs) -> Result<()> {
    let status = session.gateway.get_limiter_status().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let runtime = session.gateway.runtime().await;
    if runtime.is_degraded() {
        println!("WARNING: endpoint config unavailable, limits are not enforced");
    }
    print_bucket(runtime.limiter().read());
    print_bucket(runtime.limiter().write());

    Ok(())
}

fn print_bucket(bucket: &TokenBucket) {
    let config = bucket.config();
    let status = bucket.status();
    println!("{}:", bucket.name());
    println!(
        "  {} permits per {}ms, at most {} in flight",
        config.capacity,
        config.refill_interval.as_millis(),
        config.max_concurrent
    );
    println!("  queued: {}, running: {}", status.queued, status.running);
}
