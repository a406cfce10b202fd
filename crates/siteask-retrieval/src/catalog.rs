use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use siteask_core::{CandidateItem, Query, SiteaskError, SiteaskResult};
use tracing::{debug, warn};

use crate::backend::{site_matches, RetrievalBackend};
use crate::protocol::{extract_products, JsonRpcRequest, JsonRpcResponse};

/// Retrieval backend over a remote catalog search API.
///
/// Speaks JSON-RPC 2.0 `tools/call` over HTTP. Optionally restricted
/// to a domain pattern (e.g. `*.myshopify.com`) — outside that
/// pattern the capability probe declares non-handling and no request
/// is ever made.
pub struct CatalogBackend {
    name: String,
    endpoint: String,
    tool_name: String,
    domain_pattern: Option<String>,
    country: String,
    language: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl CatalogBackend {
    /// Creates a backend calling `tool_name` at `endpoint`.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            tool_name: tool_name.into(),
            domain_pattern: None,
            country: "US".to_string(),
            language: "en".to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Restricts this backend to sites matching `pattern`. Chainable.
    pub fn with_domain_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.domain_pattern = Some(pattern.into());
        self
    }

    /// Sets the country/language hints sent with every call. Chainable.
    pub fn with_locale(mut self, country: impl Into<String>, language: impl Into<String>) -> Self {
        self.country = country.into();
        self.language = language.into();
        self
    }

    fn item_from_product(&self, site: &str, position: usize, product: serde_json::Value) -> Option<CandidateItem> {
        let url = product
            .get("url")
            .and_then(|u| u.as_str())?
            .to_string();
        let name = product
            .get("title")
            .or_else(|| product.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or(&url)
            .to_string();
        let score = product
            .get("score")
            .and_then(|s| s.as_f64())
            .unwrap_or(1.0 / (position + 1) as f64);
        Some(CandidateItem::new(
            url,
            name,
            site,
            product,
            score,
            self.name.clone(),
        ))
    }
}

#[async_trait]
impl RetrievalBackend for CatalogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, site: &str) -> bool {
        match &self.domain_pattern {
            Some(pattern) => site_matches(pattern, site),
            None => true,
        }
    }

    async fn retrieve(
        &self,
        query: &Query,
        site: &str,
        limit: usize,
        timeout: Duration,
    ) -> SiteaskResult<Vec<CandidateItem>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(
            id,
            "tools/call",
            Some(serde_json::json!({
                "name": self.tool_name,
                "arguments": {
                    "query": query.text,
                    "context": query.prev_turns.join("\n"),
                    "limit": limit,
                    "country": self.country,
                    "language": self.language,
                }
            })),
        );

        let resp = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SiteaskError::Retrieval(format!("catalog '{}' unreachable: {e}", self.name))
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SiteaskError::Retrieval(format!(
                "catalog '{}' returned {status}",
                self.name
            )));
        }

        let body: JsonRpcResponse = resp.json().await.map_err(|e| {
            SiteaskError::Retrieval(format!("catalog '{}' sent bad JSON-RPC: {e}", self.name))
        })?;

        if let Some(err) = &body.error {
            return Err(SiteaskError::Retrieval(format!(
                "catalog '{}' error {}: {}",
                self.name, err.code, err.message
            )));
        }

        let result = match body.result {
            Some(result) => result,
            None => {
                warn!(backend = %self.name, "catalog response had neither result nor error");
                return Ok(Vec::new());
            }
        };

        let products = extract_products(&result);
        let items: Vec<CandidateItem> = products
            .into_iter()
            .enumerate()
            .filter_map(|(position, product)| self.item_from_product(site, position, product))
            .take(limit)
            .collect();

        debug!(backend = %self.name, site, items = items.len(), "catalog retrieval");
        Ok(items)
    }
}
