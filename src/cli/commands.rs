//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::pacing::{Randomizer, ScheduleLoop, SystemClock, TradingSession};
use crate::trading::{ProviderChain, RetryPolicy, RpcBroadcaster, SwapExecutor};
use crate::wallet::IdentityPool;

/// Start the pacing loop; runs until Ctrl-C
pub async fn start(config: &Config, seed: Option<u64>) -> Result<()> {
    info!("Starting swap pacer...");

    let timeout = Duration::from_millis(config.rpc.timeout_ms);
    let pool = IdentityPool::from_env(timeout).context("Failed to load identities")?;
    pool.log_status();

    let chain = ProviderChain::from_config(config);
    chain.log_status();
    if chain.available().is_empty() {
        anyhow::bail!(
            "No swap provider is available (configured: {})",
            chain.names().join(", ")
        );
    }
    info!("Provider order: {}", chain.available().join(" -> "));

    let broadcaster = Arc::new(RpcBroadcaster::new(
        config.rpc.endpoint.clone(),
        &config.submission,
    ));
    let executor = SwapExecutor::new(
        chain,
        broadcaster,
        RetryPolicy::for_submission(&config.submission),
    );

    let clock = Arc::new(SystemClock);
    let session = TradingSession::from_config(&config.session, chrono::Utc::now())?;

    if let Some(seed) = seed {
        warn!("Using fixed RNG seed {} - schedule is reproducible", seed);
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        signal_token.cancel();
    });

    let mut schedule_loop = ScheduleLoop::new(
        executor,
        pool,
        session,
        config.schedule.clone(),
        Duration::from_secs(config.session.poll_interval_secs),
    )
    .with_randomizer(Randomizer::new(seed))
    .with_clock(clock)
    .with_shutdown(shutdown);

    schedule_loop.run().await;
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// List the identity pool without trading
pub fn identities(config: &Config) -> Result<()> {
    let pool = IdentityPool::from_env(Duration::from_millis(config.rpc.timeout_ms))
        .context("Failed to load identities")?;

    println!("\n=== IDENTITIES ===\n");
    println!("{:<12} {:<46} {}", "LABEL", "ADDRESS", "ROUTE");
    println!("{}", "-".repeat(80));

    for identity in pool.identities() {
        println!(
            "{:<12} {:<46} {}",
            identity.label(),
            identity.address(),
            identity.route()
        );
    }

    println!("\nTotal: {}\n", pool.len());
    Ok(())
}
