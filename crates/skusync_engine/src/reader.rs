//! Catalog snapshot fetching.

use crate::error::{StoreResult, SyncError, SyncResult};
use crate::store::StoreClient;
use crate::transport::{PageToken, Transport};
use skusync_model::{CollectionRecord, ProductRecord, RemoteId};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info};

/// A complete snapshot of one store's catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// All products, with their collection names filled in.
    pub products: Vec<ProductRecord>,
    /// All custom collections, with member SKUs filled in.
    pub collections: Vec<CollectionRecord>,
}

/// Reads full catalog snapshots from a store.
///
/// Listings are paged through transparently. A failure on any page fails the
/// whole fetch; no partial snapshot is ever returned.
pub struct CatalogReader<'a, T: Transport> {
    store: &'a StoreClient<T>,
}

impl<'a, T: Transport> CatalogReader<'a, T> {
    /// Creates a reader over a store.
    pub fn new(store: &'a StoreClient<T>) -> Self {
        Self { store }
    }

    /// Pages through a listing until the transport reports no next page.
    async fn fetch_all<X, F, Fut>(&self, resource: &'static str, mut fetch: F) -> SyncResult<Vec<X>>
    where
        F: FnMut(Option<PageToken>) -> Fut,
        Fut: Future<Output = StoreResult<(Vec<X>, Option<PageToken>)>>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<PageToken> = None;
        let mut pages = 0usize;

        loop {
            match fetch(cursor.clone()).await {
                Ok((batch, next)) => {
                    pages += 1;
                    debug!(store = %self.store.label(), resource, page = pages, items = batch.len(), "fetched page");
                    items.extend(batch);
                    match next {
                        Some(token) => cursor = Some(token),
                        None => break,
                    }
                }
                Err(source) => {
                    return Err(SyncError::CatalogFetch {
                        store: self.store.label().to_string(),
                        resource,
                        resume_from: cursor,
                        source,
                    });
                }
            }
        }

        Ok(items)
    }

    /// Fetches every product with its variants and images.
    pub async fn fetch_catalog(&self) -> SyncResult<Vec<ProductRecord>> {
        let products = self
            .fetch_all("products", |page| self.store.products_page(page))
            .await?;
        info!(store = %self.store.label(), count = products.len(), "fetched products");
        Ok(products)
    }

    /// Fetches every custom collection and resolves its members to SKUs.
    ///
    /// Membership is queried once per collection. Members that are not among
    /// `products`, or have no usable SKU, are left out.
    pub async fn fetch_collections(
        &self,
        products: &[ProductRecord],
    ) -> SyncResult<Vec<CollectionRecord>> {
        let sku_by_id: HashMap<RemoteId, &str> = products
            .iter()
            .filter_map(|p| Some((p.id?, p.sku_key()?)))
            .collect();

        let mut collections = self
            .fetch_all("collections", |page| self.store.collections_page(page))
            .await?;

        for collection in &mut collections {
            let Some(collection_id) = collection.id else {
                continue;
            };
            let collects = self
                .fetch_all("collects", |page| {
                    self.store.collects_page(collection_id, page)
                })
                .await?;
            collection.members = collects
                .iter()
                .filter_map(|c| sku_by_id.get(&c.product_id))
                .map(|sku| sku.to_string())
                .collect();
        }

        info!(store = %self.store.label(), count = collections.len(), "fetched collections");
        Ok(collections)
    }

    /// Fetches products and collections and back-fills each product's
    /// collection names.
    pub async fn fetch_snapshot(&self) -> SyncResult<CatalogSnapshot> {
        let mut products = self.fetch_catalog().await?;
        let collections = self.fetch_collections(&products).await?;

        for product in &mut products {
            let Some(sku) = product.sku_key() else {
                continue;
            };
            let names: Vec<String> = collections
                .iter()
                .filter(|c| c.contains(sku))
                .map(|c| c.title.clone())
                .collect();
            product.collections = names;
        }

        Ok(CatalogSnapshot {
            products,
            collections,
        })
    }
}
