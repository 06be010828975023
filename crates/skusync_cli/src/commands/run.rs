//! Run command implementation.

use super::{connect, validate};
use crate::config::{CliError, RetryConfig, StoreArgs};
use crate::progress::LogSink;
use skusync_engine::{RunReport, SyncConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

/// Options of the run command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip the confirmation prompt.
    pub confirmed: bool,
    /// Maximum concurrent mutations per tier.
    pub concurrency: usize,
    /// Publish created collections.
    pub publish: bool,
    /// Records fetched per page.
    pub page_size: u32,
    /// Attempts per request for retryable failures.
    pub max_attempts: u32,
}

/// Runs the run command.
///
/// Failed operations do not make the command fail; the printed summary
/// lists them.
pub async fn run(stores: &StoreArgs, options: RunOptions, format: &str) -> Result<(), CliError> {
    let config = SyncConfig::new()
        .with_concurrency_limit(options.concurrency)
        .with_page_size(options.page_size)
        .with_publish_collections(options.publish);
    let engine = connect(stores, config, RetryConfig::new(options.max_attempts))?;
    let (source, destination) = validate(&engine).await?;

    if !options.confirmed && !confirm(&source, &destination).await? {
        println!("Aborted.");
        return Ok(());
    }

    let cancel = engine.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, letting in-flight operations finish");
            cancel.cancel();
        }
    });

    let sink = LogSink::new();
    let result = engine.run(&sink).await;
    interrupt.abort();
    let report = result?;

    println!("{}", render_report(&report, format)?);
    Ok(())
}

/// Renders a run report; failures are part of the output, not an error.
pub fn render_report(report: &RunReport, format: &str) -> Result<String, CliError> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(report)?),
        _ => Ok(report.summary.to_string()),
    }
}

async fn confirm(source: &str, destination: &str) -> Result<bool, CliError> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!("Sync catalog from {source} to {destination}? [y/N] ").as_bytes(),
        )
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
