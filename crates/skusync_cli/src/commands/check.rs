//! Check command implementation.

use super::{connect, validate};
use crate::config::{CliError, RetryConfig, StoreArgs};
use skusync_engine::SyncConfig;

/// Runs the check command.
pub async fn run(stores: &StoreArgs) -> Result<(), CliError> {
    let engine = connect(stores, SyncConfig::default(), RetryConfig::default())?;
    let (source, destination) = validate(&engine).await?;

    println!("Source:      {source} ok");
    println!("Destination: {destination} ok");
    Ok(())
}
