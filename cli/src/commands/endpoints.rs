use std::time::Instant;

use anyhow::Result;
use clap::Args;
use ledger_gateway_client::{DiagnosticsApi, LedgerReadApi};

use crate::settings::Session;

#[derive(Args)]
pub struct EndpointsArgs {
    /// Send one blockhash request through the pool before printing health
    #[arg(long)]
    ping: bool,

    /// Clear failure state of every endpoint first
    #[arg(long)]
    reset: bool,
}

pub async fn execute(session: &Session, args: EndpointsArgs) -> Result<()> {
    let gateway = &session.gateway;

    if args.reset {
        gateway.reset_endpoints().await;
        println!("Endpoint health reset");
    }

    if args.ping {
        match gateway.get_latest_blockhash().await {
            Ok(hash) => println!("Ping ok, latest blockhash {}", hash),
            Err(e) => println!("Ping failed: {}", e),
        }
    }

    if gateway.is_degraded().await {
        println!("WARNING: endpoint config unavailable, using the fallback endpoint only");
    }

    let now = Instant::now();
    println!("\nEndpoints:");
    for entry in gateway.get_endpoint_health().await {
        let state = if entry.is_disabled_at(now) {
            "disabled"
        } else if entry.is_healthy {
            "healthy"
        } else {
            "unhealthy"
        };
        println!(
            "  [{}] {:<10} {} ({})",
            entry.endpoint.priority, state, entry.endpoint.url, entry.endpoint.name
        );
        if entry.failure_count > 0 {
            println!("      consecutive failures: {}", entry.failure_count);
        }
        if let Some(until) = entry.disabled_until {
            println!(
                "      cooldown remaining: {}s",
                until.saturating_duration_since(now).as_secs()
            );
        }
    }

    let stats = gateway.get_endpoint_stats().await;
    println!(
        "\nTotal: {}, healthy: {}, unhealthy: {}, disabled: {}",
        stats.total, stats.healthy, stats.unhealthy, stats.disabled
    );
    println!("Fallback: {}", gateway.config().fallback_url);

    Ok(())
}
