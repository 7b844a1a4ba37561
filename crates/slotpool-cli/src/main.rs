//! slotpool — inspect and exercise the pools described by a slotpool.toml.
//!
//! # Usage
//!
//! ```text
//! slotpool init --path slotpool.toml
//! slotpool check --config slotpool.toml --format json
//! slotpool watch --config slotpool.toml --stats-interval 30 --warm
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "slotpool",
    about = "Named fixed-capacity connection pools",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open, ping and release one connection from every configured pool.
    Check {
        /// Path to slotpool.toml
        #[arg(short, long, default_value = "slotpool.toml")]
        config: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Register every pool and run the idle sweeper until Ctrl-C.
    Watch {
        /// Path to slotpool.toml
        #[arg(short, long, default_value = "slotpool.toml")]
        config: PathBuf,
        /// Seconds between pool statistics log lines.
        #[arg(long, default_value = "60")]
        stats_interval: u64,
        /// Open one connection per pool before starting the sweeper.
        #[arg(long)]
        warm: bool,
    },
    /// Write a scaffold slotpool.toml.
    Init {
        #[arg(short, long, default_value = "slotpool.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Commands::Check { config, format } => commands::check::check(&config, &format).await,
        Commands::Watch {
            config,
            stats_interval,
            warm,
        } => commands::watch::watch(&config, stats_interval, warm).await,
        Commands::Init { path } => commands::init::init(&path),
    }
}
