//! CLI command implementations.

pub mod check;
pub mod plan;
pub mod run;

use crate::config::{CliError, RetryConfig, StoreArgs};
use crate::http::HttpTransport;
use skusync_engine::{StoreClient, SyncConfig, SyncEngine, Transport};
use std::sync::Arc;
use tracing::info;

/// Engine over two HTTP stores.
pub type HttpEngine = SyncEngine<Arc<HttpTransport>, Arc<HttpTransport>>;

/// Builds an engine for the configured stores.
pub fn connect(
    stores: &StoreArgs,
    config: SyncConfig,
    retry: RetryConfig,
) -> Result<HttpEngine, CliError> {
    let (source, destination) = stores.credentials()?;
    info!(
        source = source.domain(),
        destination = destination.domain(),
        api_version = %stores.api_version,
        "connecting"
    );
    let source = HttpTransport::new(&source, &stores.api_version, retry.clone())?;
    let destination = HttpTransport::new(&destination, &stores.api_version, retry)?;
    Ok(SyncEngine::new(
        config,
        Arc::new(source),
        Arc::new(destination),
    ))
}

/// Validates both stores' credentials; returns their shop names.
pub async fn validate<S: Transport, D: Transport>(
    engine: &SyncEngine<S, D>,
) -> Result<(String, String), CliError> {
    let (source, destination) =
        tokio::join!(shop_name(engine.source()), shop_name(engine.destination()));
    Ok((source?, destination?))
}

async fn shop_name<T: Transport>(store: &StoreClient<T>) -> Result<String, CliError> {
    let shop = store.shop().await.map_err(|source| CliError::Credentials {
        store: store.label().to_string(),
        source,
    })?;
    Ok(shop["shop"]["name"]
        .as_str()
        .unwrap_or(store.label())
        .to_string())
}
