//! Configuration for the sync engine.

/// Largest page size the store accepts for list requests.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of mutations in flight at once within a tier.
    pub concurrency_limit: usize,
    /// Page size for list requests.
    pub page_size: u32,
    /// Whether collections created at the destination are published.
    pub publish_collections: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            concurrency_limit: 4,
            page_size: MAX_PAGE_SIZE,
            publish_collections: true,
        }
    }

    /// Sets the concurrency limit (at least 1).
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Sets the page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Sets whether new collections are published.
    pub fn with_publish_collections(mut self, publish: bool) -> Self {
        self.publish_collections = publish;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
