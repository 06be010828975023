//! skusync CLI
//!
//! Copies a product catalog from one store to another, keyed by SKU.
//!
//! # Commands
//!
//! - `check` - Validate both stores' credentials
//! - `plan` - Show what a run would change, without changing anything
//! - `run` - Create and update products and collections at the destination
//!
//! Store settings come from flags or the `SOURCE_SHOPIFY_STORE`,
//! `SOURCE_ADMIN_KEY`, `DESTINATION_SHOPIFY_STORE` and
//! `DESTINATION_ADMIN_KEY` environment variables.

mod commands;
mod config;
mod http;
mod progress;

use clap::{Parser, Subcommand};
use config::StoreArgs;
use skusync_engine::MAX_PAGE_SIZE;
use tracing_subscriber::EnvFilter;

/// Catalog sync between two stores.
#[derive(Parser)]
#[command(name = "skusync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    stores: StoreArgs,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate source and destination credentials
    Check,

    /// Show what a run would do without changing the destination
    Plan {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Records fetched per page
        #[arg(long, default_value_t = MAX_PAGE_SIZE)]
        page_size: u32,
    },

    /// Sync the source catalog onto the destination
    Run {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Maximum concurrent mutations per tier
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Create collections unpublished
        #[arg(long)]
        no_publish: bool,

        /// Records fetched per page
        #[arg(long, default_value_t = MAX_PAGE_SIZE)]
        page_size: u32,

        /// Attempts per request for retryable failures
        #[arg(long, default_value_t = 3)]
        max_attempts: u32,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check => {
            commands::check::run(&cli.stores).await?;
        }
        Commands::Plan { format, page_size } => {
            commands::plan::run(&cli.stores, page_size, &format).await?;
        }
        Commands::Run {
            yes,
            format,
            concurrency,
            no_publish,
            page_size,
            max_attempts,
        } => {
            let options = commands::run::RunOptions {
                confirmed: yes,
                concurrency,
                publish: !no_publish,
                page_size,
                max_attempts,
            };
            commands::run::run(&cli.stores, options, &format).await?;
        }
        Commands::Version => {
            println!("skusync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
