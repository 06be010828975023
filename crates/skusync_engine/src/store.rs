//! Catalog operations against one store.

use crate::config::MAX_PAGE_SIZE;
use crate::error::{StoreResult, TransportResult};
use crate::transport::{Page, PageToken, Query, Transport};
use crate::wire::{self, Collect};
use serde_json::Value;
use skusync_model::{CollectionRecord, ModelError, ProductChanges, ProductRecord, RemoteId};
use tracing::debug;

/// Fields requested for product listings.
const PRODUCT_FIELDS: &str =
    "id,title,body_html,vendor,product_type,handle,status,variants,images,options";

/// Maps catalog reads and mutations onto the store's REST resources.
///
/// Every response is parsed into catalog records before it is returned.
pub struct StoreClient<T: Transport> {
    label: String,
    transport: T,
    page_size: u32,
}

impl<T: Transport> StoreClient<T> {
    /// Creates a client. The label names the store in logs and errors.
    pub fn new(label: impl Into<String>, transport: T) -> Self {
        Self {
            label: label.into(),
            transport,
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Sets the page size of list requests.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Returns the store label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches the shop resource; used to validate credentials.
    pub async fn shop(&self) -> TransportResult<Value> {
        let page = self.transport.get("shop.json", &Query::new()).await?;
        Ok(page.body)
    }

    async fn get_page(&self, path: &str, query: Query) -> TransportResult<Page> {
        debug!(store = %self.label, path, page = ?query.page, "GET");
        self.transport.get(path, &query).await
    }

    /// Fetches one page of products.
    pub async fn products_page(
        &self,
        page: Option<PageToken>,
    ) -> StoreResult<(Vec<ProductRecord>, Option<PageToken>)> {
        let query = Query::new()
            .param("limit", self.page_size)
            .param("fields", PRODUCT_FIELDS)
            .page(page);
        let page = self.get_page("products.json", query).await?;
        Ok((wire::parse_products(&page.body)?, page.next))
    }

    /// Fetches one page of custom collections (members not filled in).
    pub async fn collections_page(
        &self,
        page: Option<PageToken>,
    ) -> StoreResult<(Vec<CollectionRecord>, Option<PageToken>)> {
        let query = Query::new().param("limit", self.page_size).page(page);
        let page = self.get_page("custom_collections.json", query).await?;
        Ok((wire::parse_collections(&page.body)?, page.next))
    }

    /// Fetches one page of the product links of a collection.
    pub async fn collects_page(
        &self,
        collection_id: RemoteId,
        page: Option<PageToken>,
    ) -> StoreResult<(Vec<Collect>, Option<PageToken>)> {
        let query = Query::new()
            .param("collection_id", collection_id)
            .param("limit", self.page_size)
            .page(page);
        let page = self.get_page("collects.json", query).await?;
        Ok((wire::parse_collects(&page.body)?, page.next))
    }

    /// Creates a product with all its variants and images; returns its id.
    pub async fn create_product(&self, product: &ProductRecord) -> StoreResult<RemoteId> {
        debug!(store = %self.label, sku = %product.sku, "POST products.json");
        let response = self
            .transport
            .post("products.json", wire::product_create_body(product))
            .await?;
        let created = wire::parse_product(&response)?;
        created
            .id
            .ok_or_else(|| ModelError::parse("product", "created product has no id").into())
    }

    /// Applies field deltas to an existing product.
    pub async fn update_product(
        &self,
        product_id: RemoteId,
        changes: &ProductChanges,
    ) -> StoreResult<RemoteId> {
        let path = format!("products/{product_id}.json");
        debug!(store = %self.label, %path, "PUT");
        let response = self
            .transport
            .put(&path, wire::product_update_body(product_id, changes))
            .await?;
        let updated = wire::parse_product(&response)?;
        Ok(updated.id.unwrap_or(product_id))
    }

    /// Creates a custom collection; returns its id.
    pub async fn create_collection(
        &self,
        title: &str,
        description: &str,
        published: bool,
    ) -> StoreResult<RemoteId> {
        debug!(store = %self.label, title, "POST custom_collections.json");
        let response = self
            .transport
            .post(
                "custom_collections.json",
                wire::collection_create_body(title, description, published),
            )
            .await?;
        let created = wire::parse_collection(&response)?;
        created
            .id
            .ok_or_else(|| ModelError::parse("collection", "created collection has no id").into())
    }

    /// Adds a product to a collection; returns the link id if the store
    /// assigned one.
    pub async fn add_to_collection(
        &self,
        product_id: RemoteId,
        collection_id: RemoteId,
    ) -> StoreResult<Option<RemoteId>> {
        debug!(store = %self.label, %product_id, %collection_id, "POST collects.json");
        let response = self
            .transport
            .post("collects.json", wire::collect_body(product_id, collection_id))
            .await?;
        Ok(wire::parse_collect(&response)?.id)
    }
}
