//! vedavoice - offline-tolerant API request queue
//!
//! Queue writes while the backend is unreachable, inspect what is pending,
//! and drain it once the network is back.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vedavoice_core::QueueConfig;

mod commands;

/// vedavoice - persistent API retry queue
#[derive(Parser, Debug)]
#[command(name = "vedavoice")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "VEDAVOICE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the queue is persisted in
    #[arg(long, env = "VEDAVOICE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Verbose logging (debug). RUST_LOG takes precedence.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue a request for delivery
    Add(commands::AddArgs),

    /// List pending requests, head first
    #[command(alias = "ls")]
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show queue length, network state, and oldest entry
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a pending request
    #[command(alias = "rm")]
    Remove {
        /// Request id (with or without the `req-` prefix)
        id: String,
    },

    /// Drop every pending request
    Clear,

    /// Deliver pending requests now, with backoff between retries
    Drain,

    /// Keep draining in the foreground until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("could not determine a data directory; pass --data-dir")?
            .join("vedavoice"),
    };
    let config = QueueConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let ctx = commands::Context::open(&config, data_dir)?;

    match cli.command {
        Commands::Add(args) => commands::add(&ctx, args),
        Commands::List { json } => commands::list(&ctx, json),
        Commands::Status { json } => commands::status(&ctx, json),
        Commands::Remove { id } => commands::remove(&ctx, &id),
        Commands::Clear => commands::clear(&ctx),
        Commands::Drain => commands::drain(&ctx).await,
        Commands::Run => commands::run(&ctx).await,
    }
}
