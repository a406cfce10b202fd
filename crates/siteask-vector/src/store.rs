use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siteask_core::{SiteaskError, SiteaskResult};
use tracing::debug;

use crate::index::NswIndex;

/// Uniform nearest-neighbor query interface over one backend.
///
/// Implementations are read-only after construction and safely shared
/// by concurrent queries. Results are `(id, distance)` pairs sorted
/// ascending by distance, at most `k` of them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Query the `k` nearest neighbors of `vector`.
    async fn query(&self, vector: &[f32], k: usize) -> SiteaskResult<Vec<(u64, f32)>>;
}

#[async_trait]
impl VectorStore for NswIndex {
    async fn query(&self, vector: &[f32], k: usize) -> SiteaskResult<Vec<(u64, f32)>> {
        NswIndex::query(self, vector, k)
    }
}

#[derive(Serialize)]
struct RemoteQueryRequest<'a> {
    vector: &'a [f32],
    k: usize,
}

#[derive(Deserialize)]
struct RemoteQueryResponse {
    #[serde(default)]
    results: Vec<RemoteHit>,
}

#[derive(Deserialize)]
struct RemoteHit {
    id: u64,
    distance: f32,
}

/// [`VectorStore`] over a remote vector-database service.
///
/// Speaks a minimal `POST {vector, k}` JSON protocol. Transport
/// failures and non-success statuses surface as retrieval errors so
/// the router treats this store's backend as having abstained.
pub struct RemoteVectorStore {
    endpoint: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl RemoteVectorStore {
    /// Creates a client for the service at `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl VectorStore for RemoteVectorStore {
    async fn query(&self, vector: &[f32], k: usize) -> SiteaskResult<Vec<(u64, f32)>> {
        let resp = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&RemoteQueryRequest { vector, k })
            .send()
            .await
            .map_err(|e| SiteaskError::Retrieval(format!("vector service unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SiteaskError::Retrieval(format!(
                "vector service returned {status}"
            )));
        }

        let body: RemoteQueryResponse = resp
            .json()
            .await
            .map_err(|e| SiteaskError::Retrieval(format!("bad vector service response: {e}")))?;

        let mut hits: Vec<(u64, f32)> = body
            .results
            .into_iter()
            .map(|h| (h.id, h.distance))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);

        debug!(endpoint = %self.endpoint, hits = hits.len(), "remote vector query");
        Ok(hits)
    }
}
