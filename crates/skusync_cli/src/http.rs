//! HTTP transport against a store's Admin REST API.

use crate::config::{CliError, RetryConfig, StoreCredentials};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, LINK, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use skusync_engine::{Page, PageToken, Query, Transport, TransportError, TransportResult};
use std::time::Duration;
use tracing::{debug, warn};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const PAGE_INFO: &str = "page_info";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Parameters the API accepts together with a `page_info` cursor.
const CURSOR_PARAMS: &[&str] = &["limit", "fields"];

/// Transport that talks to one store over HTTPS.
///
/// Rate limit rejections are retried for every method, honoring the
/// store's `Retry-After`. Network errors and server errors are retried only
/// for `GET`, since a repeated create could duplicate a resource.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: String,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Creates a transport for a store.
    pub fn new(
        credentials: &StoreCredentials,
        api_version: &str,
        retry: RetryConfig,
    ) -> Result<Self, CliError> {
        let mut token = HeaderValue::from_str(credentials.admin_key())
            .map_err(|_| CliError::InvalidAdminKey(credentials.domain().to_string()))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_TOKEN_HEADER, token);

        let client = Client::builder()
            .user_agent(concat!("skusync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CliError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base: credentials.api_base(api_version),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> TransportResult<(Value, Option<PageToken>)> {
        let url = self.url(path);
        let idempotent = method == Method::GET;
        let mut attempt = 0;

        loop {
            let request = build(self.client.request(method.clone(), &url));
            let result = match request.send().await {
                Ok(response) => read_response(response).await,
                Err(e) => Err(TransportError::Network(e.to_string())),
            };

            let err = match result {
                Ok(ok) => return Ok(ok),
                Err(err) => err,
            };

            attempt += 1;
            let retryable = err.is_rate_limited() || (idempotent && err.is_retryable());
            if !retryable || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            let delay = match &err {
                TransportError::RateLimited {
                    retry_after: Some(after),
                } => *after,
                _ => self.retry.delay_for_attempt(attempt),
            };
            warn!(
                %method,
                path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &Query) -> TransportResult<Page> {
        let params = query_params(query);
        let (body, next) = self
            .send(Method::GET, path, |req| req.query(&params))
            .await?;
        Ok(Page { body, next })
    }

    async fn post(&self, path: &str, body: Value) -> TransportResult<Value> {
        let (body, _) = self
            .send(Method::POST, path, |req| req.json(&body))
            .await?;
        Ok(body)
    }

    async fn put(&self, path: &str, body: Value) -> TransportResult<Value> {
        let (body, _) = self.send(Method::PUT, path, |req| req.json(&body)).await?;
        Ok(body)
    }
}

async fn read_response(response: Response) -> TransportResult<(Value, Option<PageToken>)> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TransportError::RateLimited {
            retry_after: retry_after(response.headers()),
        });
    }

    let next = next_page(response.headers());
    let text = response
        .text()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(TransportError::status(status.as_u16(), text));
    }
    debug!(status = status.as_u16(), bytes = text.len(), "response");

    if text.trim().is_empty() {
        return Ok((Value::Null, next));
    }
    let body = serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?;
    Ok((body, next))
}

/// Builds the query string of a request.
///
/// A cursor request may only repeat `limit` and `fields`; any other filter
/// is already encoded in the cursor.
fn query_params(query: &Query) -> Vec<(String, String)> {
    match &query.page {
        None => query.params.clone(),
        Some(token) => query
            .params
            .iter()
            .filter(|(k, _)| CURSOR_PARAMS.contains(&k.as_str()))
            .cloned()
            .chain(std::iter::once((
                PAGE_INFO.to_string(),
                token.as_str().to_string(),
            )))
            .collect(),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

fn next_page(headers: &HeaderMap) -> Option<PageToken> {
    let link = headers.get(LINK)?.to_str().ok()?;
    parse_next_link(link)
}

/// Extracts the `page_info` cursor of the `rel="next"` entry of a `Link`
/// header.
fn parse_next_link(link: &str) -> Option<PageToken> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        let url = Url::parse(target.trim_start_matches('<').trim_end_matches('>')).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == PAGE_INFO)
            .map(|(_, v)| PageToken::new(v.into_owned()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_next_cursor() {
        let link = "<https://shop.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=abc>; rel=\"previous\", \
                    <https://shop.myshopify.com/admin/api/2024-01/products.json?limit=250&page_info=def>; rel=\"next\"";
        assert_eq!(parse_next_link(link), Some(PageToken::new("def")));

        let last = "<https://shop.myshopify.com/admin/api/2024-01/products.json?page_info=abc>; rel=\"previous\"";
        assert_eq!(parse_next_link(last), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn cursor_requests_drop_filters() {
        let first = Query::new()
            .param("collection_id", 7)
            .param("limit", 250);
        assert_eq!(query_params(&first).len(), 2);

        let next = first.page(Some(PageToken::new("xyz")));
        assert_eq!(
            query_params(&next),
            vec![
                ("limit".to_string(), "250".to_string()),
                ("page_info".to_string(), "xyz".to_string()),
            ]
        );
    }

    #[test]
    fn retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2.0"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("-1"));
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn transport_targets_admin_api() {
        let creds = StoreCredentials::new("shop.myshopify.com", "shpat_1").unwrap();
        let transport = HttpTransport::new(&creds, "2024-01", RetryConfig::no_retry()).unwrap();
        assert_eq!(
            transport.url("products.json"),
            "https://shop.myshopify.com/admin/api/2024-01/products.json"
        );
    }
}
