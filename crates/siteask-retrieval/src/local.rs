use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siteask_core::{CandidateItem, Query, SiteaskError, SiteaskResult};
use siteask_vector::{EmbeddingProvider, NswIndex, ShardMetadata, VectorStore};
use tracing::debug;

use crate::backend::RetrievalBackend;

/// Per-id document attributes carried alongside an index shard.
///
/// One JSON object per line in the shard's `docs.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardDoc {
    /// Integer id matching the indexed vector.
    pub id: u64,
    /// Canonical URL of the document.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Opaque attributes passed through to the candidate payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Retrieval backend over a [`VectorStore`] — a local ANN shard or a
/// remote vector service behind the same interface.
///
/// The capability probe answers from the shard's domain list without
/// touching the store; retrieval embeds the query text, over-fetches,
/// filters hits to the requested site via the per-id domain mapping,
/// and joins ids against the document attributes.
pub struct VectorBackend {
    name: String,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    /// `domains[i]` owns integer id `i`, as in the shard sidecar.
    domains: Vec<String>,
    docs: HashMap<u64, ShardDoc>,
}

impl VectorBackend {
    /// Assembles a backend from parts. Used directly when the store is
    /// remote; [`VectorBackend::open`] covers the on-disk shard case.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        domains: Vec<String>,
        docs: Vec<ShardDoc>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            embedder,
            domains,
            docs: docs.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    /// Opens an on-disk shard directory: `index.bin`, the `index.json`
    /// sidecar, and `docs.jsonl`. Fails fast on any inconsistency
    /// between the three.
    pub fn open(
        name: impl Into<String>,
        dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> SiteaskResult<Self> {
        let index = NswIndex::load(&dir.join("index.bin"))?;
        let meta = ShardMetadata::load(&dir.join("index.json"))?;
        meta.validate(&index)?;

        let docs_path = dir.join("docs.jsonl");
        let data = std::fs::read_to_string(&docs_path).map_err(|e| {
            SiteaskError::Config(format!("cannot read shard docs {}: {e}", docs_path.display()))
        })?;
        let docs: Vec<ShardDoc> = data
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SiteaskError::Config(format!("malformed shard docs: {e}")))?;

        Ok(Self::new(name, Arc::new(index), embedder, meta.domains, docs))
    }

    fn candidate_for(&self, id: u64, distance: f32) -> Option<CandidateItem> {
        let doc = self.docs.get(&id)?;
        let site = self.domains.get(id as usize)?;
        Some(CandidateItem::new(
            doc.url.clone(),
            doc.name.clone(),
            site.clone(),
            doc.payload.clone(),
            f64::from(1.0 - distance),
            self.name.clone(),
        ))
    }
}

#[async_trait]
impl RetrievalBackend for VectorBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, site: &str) -> bool {
        self.domains.iter().any(|d| d == site)
    }

    async fn retrieve(
        &self,
        query: &Query,
        site: &str,
        limit: usize,
        timeout: Duration,
    ) -> SiteaskResult<Vec<CandidateItem>> {
        let lookup = async {
            let vector = self.embedder.embed(&query.text).await?;
            // Over-fetch: hits from other domains in the shard are
            // filtered out below.
            self.store.query(&vector, limit * 4).await
        };

        let hits = tokio::time::timeout(timeout, lookup).await.map_err(|_| {
            SiteaskError::Retrieval(format!(
                "vector backend '{}' timed out after {timeout:?}",
                self.name
            ))
        })??;

        let items: Vec<CandidateItem> = hits
            .into_iter()
            .filter(|(id, _)| self.domains.get(*id as usize).is_some_and(|d| d == site))
            .filter_map(|(id, distance)| self.candidate_for(id, distance))
            .take(limit)
            .collect();

        debug!(backend = %self.name, site, items = items.len(), "vector retrieval");
        Ok(items)
    }
}
