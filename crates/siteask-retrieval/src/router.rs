use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use siteask_core::{CandidateItem, Query, SiteRegistry};
use tracing::{debug, info, warn};

use crate::backend::RetrievalBackend;

/// The merged output of one routed retrieval.
///
/// `attempted`/`failed` let the caller distinguish "every backend
/// failed" (no answer available) from "backends responded with zero
/// matches".
#[derive(Debug)]
pub struct MergedCandidates {
    /// De-duplicated candidates in backend registration order.
    pub items: Vec<CandidateItem>,
    /// Number of backends invoked.
    pub attempted: usize,
    /// Number of invoked backends that failed or timed out.
    pub failed: usize,
}

impl MergedCandidates {
    /// True when at least one backend was invoked and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Routes a query to the retrieval backends able to serve it and
/// merges their results.
///
/// Backends are probed in registration order; registration order is
/// also merge priority for de-duplication. When no backend handles
/// the query's site, the router falls back to cross-site routing: it
/// infers the query's item type from the registry and retries against
/// every site declaring that type.
pub struct RetrievalRouter {
    backends: Vec<Arc<dyn RetrievalBackend>>,
    registry: Arc<SiteRegistry>,
    backend_timeout: Duration,
    /// Extra slack past `backend_timeout` before the router abandons a
    /// backend that ignored its own deadline.
    overrun_grace: Duration,
}

impl RetrievalRouter {
    /// Creates a router over `registry` with the given per-backend
    /// timeout.
    pub fn new(registry: Arc<SiteRegistry>, backend_timeout: Duration) -> Self {
        Self {
            backends: Vec::new(),
            registry,
            backend_timeout,
            overrun_grace: Duration::from_millis(500),
        }
    }

    /// Registers a backend. Registration order is probe and merge
    /// priority. Chainable.
    pub fn register(mut self, backend: Arc<dyn RetrievalBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Overrides the deadline slack for misbehaving backends. Chainable.
    pub fn with_overrun_grace(mut self, grace: Duration) -> Self {
        self.overrun_grace = grace;
        self
    }

    /// Backends willing to serve `site`, paired with that site, in
    /// registration order.
    fn targets_for(&self, site: &str) -> Vec<(Arc<dyn RetrievalBackend>, String)> {
        self.backends
            .iter()
            .filter(|b| b.can_handle(site))
            .map(|b| (Arc::clone(b), site.to_string()))
            .collect()
    }

    /// Routes `query`, invoking every handling backend concurrently.
    ///
    /// Partial results are accepted: a failing or timed-out backend
    /// contributes nothing and is counted in `failed`, but the query
    /// never fails because one backend did.
    pub async fn route(&self, query: &Query, limit: usize) -> MergedCandidates {
        let mut targets = self.targets_for(&query.site);

        if targets.is_empty() {
            if let Some(item_type) = self.registry.infer_item_type(&query.text) {
                let sites = self.registry.sites_for_item_type(&item_type);
                debug!(
                    site = %query.site,
                    item_type,
                    fallback_sites = sites.len(),
                    "no backend handles site, trying cross-site fallback"
                );
                for site in sites {
                    if site != query.site {
                        targets.extend(self.targets_for(&site));
                    }
                }
            }
        }

        if targets.is_empty() {
            info!(site = %query.site, "no backend can serve this query");
            return MergedCandidates {
                items: Vec::new(),
                attempted: 0,
                failed: 0,
            };
        }

        let attempted = targets.len();
        let outer_deadline = self.backend_timeout + self.overrun_grace;

        let calls = targets.iter().map(|(backend, site)| {
            let backend = Arc::clone(backend);
            let site = site.clone();
            async move {
                let outcome = tokio::time::timeout(
                    outer_deadline,
                    backend.retrieve(query, &site, limit, self.backend_timeout),
                )
                .await;
                match outcome {
                    Ok(Ok(items)) => {
                        debug!(backend = backend.name(), site = %site, items = items.len(), "backend succeeded");
                        Some(items)
                    }
                    Ok(Err(e)) => {
                        warn!(backend = backend.name(), site = %site, error = %e, "backend failed");
                        None
                    }
                    Err(_) => {
                        warn!(backend = backend.name(), site = %site, "backend overran its deadline");
                        None
                    }
                }
            }
        });

        let settled = join_all(calls).await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut items: Vec<CandidateItem> = Vec::new();
        let mut failed = 0;
        for outcome in settled {
            match outcome {
                Some(batch) => {
                    for item in batch {
                        if seen.insert(item.url.clone()) {
                            items.push(item);
                        }
                    }
                }
                None => failed += 1,
            }
        }

        info!(
            site = %query.site,
            attempted,
            failed,
            merged = items.len(),
            "retrieval routing complete"
        );

        MergedCandidates {
            items,
            attempted,
            failed,
        }
    }
}
