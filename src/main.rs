//! Swap pacer - paced multi-wallet swaps through aggregator fallback
//!
//! # WARNING
//! - This tool signs and submits real transactions with every configured key.
//! - Each forward swap is followed by a best-effort hedge; a failed hedge
//!   leaves the position open.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

// Use the library crate
use swap_pacer::cli::commands;
use swap_pacer::config::Config;

/// Swap pacer - paced multi-wallet swaps
#[derive(Parser)]
#[command(name = "pacer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the schedule loop
    Start {
        /// Seed the RNG for a reproducible schedule
        #[arg(long, env = "PACER_SEED")]
        seed: Option<u64>,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// List configured identities and their routes
    Identities,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("swap_pacer=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs)?;

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Start { seed } => commands::start(&config, seed).await,
        Commands::Config => commands::show_config(&config),
        Commands::Identities => commands::identities(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
