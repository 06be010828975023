//! In-memory store transport for tests and local runs.
//!
//! [`MemoryStore`] speaks the same JSON resources as a real store: product
//! and collection listings are paged, created entities get fresh ids, and a
//! product update replaces its variant and image lists with exactly the
//! entries it lists. Failures can be injected per request.

use crate::config::MAX_PAGE_SIZE;
use crate::error::{TransportError, TransportResult};
use crate::transport::{Page, PageToken, Query, Transport};
use crate::wire;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use skusync_model::{CollectionRecord, ProductRecord, RemoteId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

/// Page size used when a listing does not ask for one.
const DEFAULT_LIMIT: usize = 50;

/// HTTP method of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read.
    Get,
    /// Create.
    Post,
    /// Update.
    Put,
}

/// A request received by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method.
    pub method: Method,
    /// Resource path.
    pub path: String,
    /// Query, for reads.
    pub query: Query,
    /// Body, for writes.
    pub body: Option<Value>,
}

impl Request {
    /// Returns true if the serialized body contains `needle`.
    pub fn body_contains(&self, needle: &str) -> bool {
        self.body
            .as_ref()
            .is_some_and(|b| b.to_string().contains(needle))
    }

    /// Returns the continuation token of a read.
    pub fn page(&self) -> Option<&str> {
        self.query.page.as_ref().map(PageToken::as_str)
    }

    /// Returns true for writes.
    pub fn is_mutation(&self) -> bool {
        self.method != Method::Get
    }
}

type FailurePredicate = Box<dyn Fn(&Request) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    next_id: u64,
    products: BTreeMap<u64, Value>,
    collections: BTreeMap<u64, Value>,
    collects: Vec<Value>,
}

/// A store kept entirely in memory.
pub struct MemoryStore {
    shop_name: String,
    state: Mutex<State>,
    requests: Mutex<Vec<Request>>,
    failure: Mutex<Option<FailurePredicate>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            shop_name: "memory".into(),
            state: Mutex::new(State::default()),
            requests: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the shop name reported by `shop.json`.
    pub fn with_shop_name(mut self, name: impl Into<String>) -> Self {
        self.shop_name = name.into();
        self
    }

    /// Starts id assignment after `base`, so two stores never share ids.
    pub fn with_id_base(self, base: u64) -> Self {
        self.state.lock().next_id = base;
        self
    }

    /// Delays every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fails every request matching `predicate` with HTTP 500.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        *self.failure.lock() = Some(Box::new(predicate));
    }

    /// Stops injecting failures.
    pub fn clear_failures(&self) {
        *self.failure.lock() = None;
    }

    /// Seeds a product; returns its id.
    pub fn insert_product(&self, product: &ProductRecord) -> RemoteId {
        let body = wire::product_create_body(product);
        let mut state = self.state.lock();
        let created = state.create_product(&body);
        match created {
            Ok(value) => RemoteId::new(value["product"]["id"].as_u64().unwrap_or_default()),
            Err(e) => {
                warn!(error = %e, sku = %product.sku, "seed product rejected");
                RemoteId::new(0)
            }
        }
    }

    /// Seeds a collection; returns its id.
    pub fn insert_collection(&self, title: &str) -> RemoteId {
        let body = wire::collection_create_body(title, "", true);
        let mut state = self.state.lock();
        match state.create_collection(&body) {
            Ok(value) => {
                RemoteId::new(value["custom_collection"]["id"].as_u64().unwrap_or_default())
            }
            Err(e) => {
                warn!(error = %e, title, "seed collection rejected");
                RemoteId::new(0)
            }
        }
    }

    /// Seeds a collection membership.
    pub fn insert_member(&self, collection_id: RemoteId, product_id: RemoteId) {
        let body = wire::collect_body(product_id, collection_id);
        if let Err(e) = self.state.lock().create_collect(&body) {
            warn!(error = %e, %collection_id, %product_id, "seed membership rejected");
        }
    }

    /// Returns every stored product.
    pub fn products(&self) -> Vec<ProductRecord> {
        let state = self.state.lock();
        state
            .products
            .values()
            .filter_map(|p| wire::parse_product(&json!({ "product": p })).ok())
            .collect()
    }

    /// Returns the stored product whose first variant has this SKU.
    pub fn product_by_sku(&self, sku: &str) -> Option<ProductRecord> {
        self.products().into_iter().find(|p| p.sku == sku)
    }

    /// Returns every stored collection with its member SKUs.
    pub fn collections(&self) -> Vec<CollectionRecord> {
        let state = self.state.lock();
        state
            .collections
            .iter()
            .map(|(id, c)| {
                let members = state
                    .collects
                    .iter()
                    .filter(|l| l["collection_id"].as_u64() == Some(*id))
                    .filter_map(|l| l["product_id"].as_u64())
                    .filter_map(|pid| state.products.get(&pid))
                    .filter_map(|p| p["variants"][0]["sku"].as_str())
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>();
                CollectionRecord {
                    id: Some(RemoteId::new(*id)),
                    title: c["title"].as_str().unwrap_or_default().to_string(),
                    description: c["body_html"].as_str().unwrap_or_default().to_string(),
                    members,
                }
            })
            .collect()
    }

    /// Returns every request received, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Returns the number of write requests received.
    pub fn mutation_count(&self) -> usize {
        self.requests.lock().iter().filter(|r| r.is_mutation()).count()
    }

    /// Returns the highest number of requests handled at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn handle(&self, request: Request) -> TransportResult<Page> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .failure
            .lock()
            .as_ref()
            .is_some_and(|fails| fails(&request));
        let result = if injected {
            Err(TransportError::status(500, "injected failure"))
        } else {
            self.route(&request)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn route(&self, request: &Request) -> TransportResult<Page> {
        let mut state = self.state.lock();
        let empty = Value::Null;
        let body = request.body.as_ref().unwrap_or(&empty);
        let segments: Vec<&str> = request.path.split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["shop.json"]) => Ok(Page::last(json!({
                "shop": {
                    "name": self.shop_name,
                    "myshopify_domain": format!("{}.myshopify.com", self.shop_name),
                }
            }))),
            (Method::Get, ["products.json"]) => {
                let items = state.products.values().cloned().collect();
                paged(items, "products", &request.query)
            }
            (Method::Get, ["custom_collections.json"]) => {
                let items = state.collections.values().cloned().collect();
                paged(items, "custom_collections", &request.query)
            }
            (Method::Get, ["collects.json"]) => {
                let filter = request
                    .query
                    .get("collection_id")
                    .and_then(|id| id.parse::<u64>().ok());
                let items = state
                    .collects
                    .iter()
                    .filter(|c| filter.map_or(true, |id| c["collection_id"].as_u64() == Some(id)))
                    .cloned()
                    .collect();
                paged(items, "collects", &request.query)
            }
            (Method::Post, ["products.json"]) => state.create_product(body).map(Page::last),
            (Method::Put, ["products", file]) => {
                let id = file
                    .strip_suffix(".json")
                    .and_then(|id| id.parse::<u64>().ok())
                    .ok_or_else(not_found)?;
                state.update_product(id, body).map(Page::last)
            }
            (Method::Post, ["custom_collections.json"]) => {
                state.create_collection(body).map(Page::last)
            }
            (Method::Post, ["collects.json"]) => state.create_collect(body).map(Page::last),
            _ => Err(not_found()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryStore {
    async fn get(&self, path: &str, query: &Query) -> TransportResult<Page> {
        self.handle(Request {
            method: Method::Get,
            path: path.to_string(),
            query: query.clone(),
            body: None,
        })
        .await
    }

    async fn post(&self, path: &str, body: Value) -> TransportResult<Value> {
        self.handle(Request {
            method: Method::Post,
            path: path.to_string(),
            query: Query::new(),
            body: Some(body),
        })
        .await
        .map(|page| page.body)
    }

    async fn put(&self, path: &str, body: Value) -> TransportResult<Value> {
        self.handle(Request {
            method: Method::Put,
            path: path.to_string(),
            query: Query::new(),
            body: Some(body),
        })
        .await
        .map(|page| page.body)
    }
}

fn not_found() -> TransportError {
    TransportError::status(404, json!({ "errors": "Not Found" }).to_string())
}

fn unprocessable(field: &str, message: impl Into<String>) -> TransportError {
    let message: String = message.into();
    let mut errors = Map::new();
    errors.insert(field.to_string(), json!([message]));
    TransportError::status(422, json!({ "errors": errors }).to_string())
}

fn paged(items: Vec<Value>, key: &str, query: &Query) -> TransportResult<Page> {
    let limit = query
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_PAGE_SIZE as usize);
    let offset = match &query.page {
        Some(token) => token
            .as_str()
            .parse::<usize>()
            .map_err(|_| TransportError::status(400, "invalid page_info"))?,
        None => 0,
    };

    let end = offset.saturating_add(limit).min(items.len());
    let slice = items.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();
    let next = (end < items.len()).then(|| PageToken::new(end.to_string()));

    let mut body = Map::new();
    body.insert(key.to_string(), Value::Array(slice));
    Ok(Page {
        body: Value::Object(body),
        next,
    })
}

fn object<'a>(body: &'a Value, key: &str) -> TransportResult<&'a Map<String, Value>> {
    body.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| unprocessable(key, "is required"))
}

fn non_blank<'a>(fields: &'a Map<String, Value>, key: &str) -> TransportResult<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| unprocessable(key, "can't be blank"))
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn new_child(&mut self, parent: u64, fields: &Map<String, Value>) -> Value {
        let mut child = fields.clone();
        child.insert("id".into(), json!(self.next_id()));
        child.insert("product_id".into(), json!(parent));
        Value::Object(child)
    }

    /// Merges child entries (variants or images) into the existing list.
    ///
    /// Entries with an id update that child; entries without one create a
    /// child. Children not listed are dropped.
    fn merge_children(
        &mut self,
        parent: u64,
        existing: &[Value],
        entries: &[Value],
        kind: &str,
    ) -> TransportResult<Vec<Value>> {
        let mut merged = Vec::with_capacity(entries.len());
        for entry in entries {
            let fields = entry
                .as_object()
                .ok_or_else(|| unprocessable(kind, "must be an object"))?;
            match fields.get("id").and_then(Value::as_u64) {
                Some(child_id) => {
                    let mut current = existing
                        .iter()
                        .find(|c| c["id"].as_u64() == Some(child_id))
                        .and_then(Value::as_object)
                        .cloned()
                        .ok_or_else(|| {
                            unprocessable(kind, format!("{child_id} does not belong to product {parent}"))
                        })?;
                    for (k, v) in fields {
                        current.insert(k.clone(), v.clone());
                    }
                    merged.push(Value::Object(current));
                }
                None => merged.push(self.new_child(parent, fields)),
            }
        }
        Ok(merged)
    }

    fn create_product(&mut self, body: &Value) -> TransportResult<Value> {
        let input = object(body, "product")?;
        non_blank(input, "title")?;

        let id = self.next_id();
        let mut product = input.clone();
        product.insert("id".into(), json!(id));
        product
            .entry("status")
            .or_insert_with(|| json!("active"));

        let variants = array(input, "variants");
        let variants = self.merge_children(id, &[], &variants, "variants")?;
        product.insert("variants".into(), Value::Array(with_prices(variants)));

        let images = array(input, "images");
        let images = self.merge_children(id, &[], &images, "images")?;
        product.insert("images".into(), Value::Array(with_positions(images)));

        self.products.insert(id, Value::Object(product.clone()));
        Ok(json!({ "product": product }))
    }

    fn update_product(&mut self, id: u64, body: &Value) -> TransportResult<Value> {
        let input = object(body, "product")?;
        let mut product = self
            .products
            .get(&id)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(not_found)?;

        for key in ["title", "body_html", "vendor", "product_type", "handle", "status", "options"] {
            if let Some(value) = input.get(key) {
                product.insert(key.into(), value.clone());
            }
        }
        if product.get("title").and_then(Value::as_str).is_some_and(|t| t.trim().is_empty()) {
            return Err(unprocessable("title", "can't be blank"));
        }

        if input.contains_key("variants") {
            let existing = array(&product, "variants");
            let variants = self.merge_children(id, &existing, &array(input, "variants"), "variants")?;
            product.insert("variants".into(), Value::Array(with_prices(variants)));
        }
        if input.contains_key("images") {
            let existing = array(&product, "images");
            let images = self.merge_children(id, &existing, &array(input, "images"), "images")?;
            product.insert("images".into(), Value::Array(with_positions(images)));
        }

        self.products.insert(id, Value::Object(product.clone()));
        Ok(json!({ "product": product }))
    }

    fn create_collection(&mut self, body: &Value) -> TransportResult<Value> {
        let input = object(body, "custom_collection")?;
        non_blank(input, "title")?;

        let id = self.next_id();
        let mut collection = input.clone();
        collection.insert("id".into(), json!(id));
        self.collections.insert(id, Value::Object(collection.clone()));
        Ok(json!({ "custom_collection": collection }))
    }

    fn create_collect(&mut self, body: &Value) -> TransportResult<Value> {
        let input = object(body, "collect")?;
        let product_id = input.get("product_id").and_then(Value::as_u64);
        let collection_id = input.get("collection_id").and_then(Value::as_u64);

        let (Some(product_id), Some(collection_id)) = (product_id, collection_id) else {
            return Err(unprocessable("collect", "product_id and collection_id are required"));
        };
        if !self.products.contains_key(&product_id) {
            return Err(unprocessable("product", "not found"));
        }
        if !self.collections.contains_key(&collection_id) {
            return Err(unprocessable("collection", "not found"));
        }
        let exists = self.collects.iter().any(|c| {
            c["product_id"].as_u64() == Some(product_id)
                && c["collection_id"].as_u64() == Some(collection_id)
        });
        if exists {
            return Err(unprocessable("product_id", "already exists in this collection"));
        }

        let collect = json!({
            "id": self.next_id(),
            "product_id": product_id,
            "collection_id": collection_id,
        });
        self.collects.push(collect.clone());
        Ok(json!({ "collect": collect }))
    }
}

fn array(fields: &Map<String, Value>, key: &str) -> Vec<Value> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn with_prices(mut variants: Vec<Value>) -> Vec<Value> {
    for variant in &mut variants {
        if let Some(fields) = variant.as_object_mut() {
            fields.entry("price").or_insert_with(|| json!("0.00"));
        }
    }
    variants
}

fn with_positions(mut images: Vec<Value>) -> Vec<Value> {
    for (i, image) in images.iter_mut().enumerate() {
        if let Some(fields) = image.as_object_mut() {
            fields.entry("position").or_insert_with(|| json!(i + 1));
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreClient;
    use skusync_model::{Price, VariantRecord};

    fn product(sku: &str) -> ProductRecord {
        ProductRecord::new(sku, format!("Product {sku}"))
            .with_variant(VariantRecord::new(sku, Price::parse("4.50").unwrap(), 2))
    }

    #[tokio::test]
    async fn listings_are_paged() {
        let memory = MemoryStore::new();
        for i in 0..5 {
            memory.insert_product(&product(&format!("P{i}")));
        }
        let store = StoreClient::new("memory", memory).with_page_size(2);

        let (first, next) = store.products_page(None).await.unwrap();
        assert_eq!(first.len(), 2);
        let (second, next) = store.products_page(next).await.unwrap();
        assert_eq!(second.len(), 2);
        let (third, next) = store.products_page(next).await.unwrap();
        assert_eq!(third.len(), 1);
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn update_drops_unlisted_variants() {
        let memory = MemoryStore::new();
        let id = memory.insert_product(
            &product("A1").with_variant(VariantRecord::new("A1-B", Price::parse("5").unwrap(), 1)),
        );
        let first_variant = memory.products()[0].variants[0].id.unwrap();

        let body = json!({ "product": { "id": id.get(), "variants": [ { "id": first_variant.get() } ] } });
        memory
            .put(&format!("products/{id}.json"), body)
            .await
            .unwrap();

        let stored = memory.product_by_sku("A1").unwrap();
        assert_eq!(stored.variants.len(), 1);
        assert_eq!(stored.variants[0].id, Some(first_variant));
    }

    #[tokio::test]
    async fn duplicate_membership_is_rejected() {
        let memory = MemoryStore::new();
        let product_id = memory.insert_product(&product("A1"));
        let collection_id = memory.insert_collection("Summer");
        memory.insert_member(collection_id, product_id);

        let err = memory
            .post("collects.json", wire::collect_body(product_id, collection_id))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 422, .. }));
        assert!(memory.collections()[0].contains("A1"));
    }

    #[tokio::test]
    async fn injected_failures_and_request_log() {
        let memory = MemoryStore::new();
        memory.fail_when(|req| req.path == "shop.json");

        let err = memory.get("shop.json", &Query::new()).await.unwrap_err();
        assert_eq!(err, TransportError::status(500, "injected failure"));

        memory.clear_failures();
        let page = memory.get("shop.json", &Query::new()).await.unwrap();
        assert_eq!(page.body["shop"]["name"], "memory");
        assert_eq!(memory.requests().len(), 2);
        assert_eq!(memory.mutation_count(), 0);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let memory = MemoryStore::new();
        let err = memory
            .post("products.json", json!({ "product": { "title": " " } }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("can't be blank"));
    }
}
