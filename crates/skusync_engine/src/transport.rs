//! Transport layer abstraction for store requests.

use crate::error::TransportResult;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque pagination continuation token.
///
/// Issued by a transport with one page and handed back to it to fetch the
/// next. The engine never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    /// Wraps a transport-specific token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query parameters of a `GET` request, plus an optional continuation token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Parameters in the order they were added.
    pub params: Vec<(String, String)>,
    /// Continuation token of the page to fetch; `None` for the first page.
    pub page: Option<PageToken>,
}

impl Query {
    /// Creates an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Sets the continuation token.
    pub fn page(mut self, token: Option<PageToken>) -> Self {
        self.page = token;
        self
    }

    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// One page of a `GET` response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Response body.
    pub body: Value,
    /// Token for the next page, `None` on the last page.
    pub next: Option<PageToken>,
}

impl Page {
    /// A page with no successor.
    pub fn last(body: Value) -> Self {
        Self { body, next: None }
    }
}

/// A transport handles authenticated requests against one store.
///
/// Paths are relative to the store's admin API root (e.g. `products.json`).
/// Implementations own authentication, retries and backoff; every error they
/// return is final for the request that raised it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches one page of a resource.
    async fn get(&self, path: &str, query: &Query) -> TransportResult<Page>;

    /// Creates a resource.
    async fn post(&self, path: &str, body: Value) -> TransportResult<Value>;

    /// Updates a resource.
    async fn put(&self, path: &str, body: Value) -> TransportResult<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, path: &str, query: &Query) -> TransportResult<Page> {
        (**self).get(path, query).await
    }

    async fn post(&self, path: &str, body: Value) -> TransportResult<Value> {
        (**self).post(path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> TransportResult<Value> {
        (**self).put(path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder() {
        let query = Query::new()
            .param("limit", 250)
            .param("collection_id", 7)
            .page(Some(PageToken::new("next-1")));

        assert_eq!(query.get("limit"), Some("250"));
        assert_eq!(query.get("collection_id"), Some("7"));
        assert_eq!(query.get("fields"), None);
        assert_eq!(query.page.as_ref().map(|p| p.as_str()), Some("next-1"));
    }
}
