//! Store credentials, retry policy and CLI errors.

use clap::Args;
use secrecy::{ExposeSecret, SecretString};
use skusync_engine::{SyncError, TransportError};
use std::time::Duration;
use thiserror::Error;

/// Domain every store URL must belong to.
const STORE_DOMAIN: &str = "myshopify.com";

/// Admin API version used when none is given.
pub const DEFAULT_API_VERSION: &str = "2024-01";

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// A required setting was not given.
    #[error("missing {what}: pass --{flag} or set {env}")]
    MissingSetting {
        /// Human-readable name.
        what: &'static str,
        /// Command-line flag.
        flag: &'static str,
        /// Environment variable.
        env: &'static str,
    },

    /// The store URL is not a store domain.
    #[error("invalid store URL {0:?}: must end with '{STORE_DOMAIN}'")]
    InvalidStoreUrl(String),

    /// The admin key cannot be sent as a header.
    #[error("admin key for {0} contains characters not allowed in a header")]
    InvalidAdminKey(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// A store rejected its credentials.
    #[error("could not validate {store} credentials: {source}")]
    Credentials {
        /// Store label.
        store: String,
        /// Underlying failure.
        #[source]
        source: TransportError,
    },

    /// The run itself failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Reading the confirmation failed.
    #[error("failed to read confirmation: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering JSON output failed.
    #[error("failed to render output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Store connection settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Source store domain (e.g. my-source.myshopify.com)
    #[arg(global = true, long, env = "SOURCE_SHOPIFY_STORE")]
    pub source_store: Option<String>,

    /// Source store Admin API access token
    #[arg(global = true, long, env = "SOURCE_ADMIN_KEY", hide_env_values = true)]
    pub source_key: Option<String>,

    /// Destination store domain
    #[arg(global = true, long, env = "DESTINATION_SHOPIFY_STORE")]
    pub dest_store: Option<String>,

    /// Destination store Admin API access token
    #[arg(global = true, long, env = "DESTINATION_ADMIN_KEY", hide_env_values = true)]
    pub dest_key: Option<String>,

    /// Admin API version
    #[arg(global = true, long, default_value = DEFAULT_API_VERSION)]
    pub api_version: String,
}

impl StoreArgs {
    /// Validates and returns the source and destination credentials.
    pub fn credentials(&self) -> Result<(StoreCredentials, StoreCredentials), CliError> {
        let source = StoreCredentials::new(
            required(&self.source_store, "source store", "source-store", "SOURCE_SHOPIFY_STORE")?,
            required(&self.source_key, "source admin key", "source-key", "SOURCE_ADMIN_KEY")?,
        )?;
        let destination = StoreCredentials::new(
            required(
                &self.dest_store,
                "destination store",
                "dest-store",
                "DESTINATION_SHOPIFY_STORE",
            )?,
            required(
                &self.dest_key,
                "destination admin key",
                "dest-key",
                "DESTINATION_ADMIN_KEY",
            )?,
        )?;
        Ok((source, destination))
    }
}

fn required<'a>(
    value: &'a Option<String>,
    what: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<&'a str, CliError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(CliError::MissingSetting { what, flag, env })
}

/// Credentials for one store.
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    domain: String,
    admin_key: SecretString,
}

impl StoreCredentials {
    /// Validates a store URL and wraps the admin key.
    ///
    /// The URL may carry a scheme and a trailing slash; both are dropped.
    pub fn new(store_url: &str, admin_key: &str) -> Result<Self, CliError> {
        let domain = store_url
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_ascii_lowercase();

        if !domain.ends_with(STORE_DOMAIN) || domain.contains('/') {
            return Err(CliError::InvalidStoreUrl(store_url.to_string()));
        }
        if admin_key.trim().is_empty() {
            return Err(CliError::MissingSetting {
                what: "admin key",
                flag: "source-key / --dest-key",
                env: "SOURCE_ADMIN_KEY / DESTINATION_ADMIN_KEY",
            });
        }

        Ok(Self {
            domain,
            admin_key: SecretString::from(admin_key.trim().to_string()),
        })
    }

    /// Returns the store domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the Admin API root for a version, with a trailing slash.
    pub fn api_base(&self, api_version: &str) -> String {
        format!("https://{}/admin/api/{}/", self.domain, api_version)
    }

    /// Exposes the admin key. Never log the result.
    pub fn admin_key(&self) -> &str {
        self.admin_key.expose_secret()
    }
}

/// Configuration for retry behavior of HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Cheap pseudo-random value in `[0, 1)` from the clock.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
