use serde::{Deserialize, Serialize};

/// A retrieval candidate produced by a backend.
///
/// Immutable once produced: backends construct items through
/// [`CandidateItem::new`] and nothing downstream mutates them. The
/// payload is the backend's opaque document (catalog product JSON,
/// shard attributes, ...) carried through to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Canonical URL of the item. Merge de-duplication key.
    pub url: String,
    /// Human-readable display name.
    pub name: String,
    /// The site this item belongs to.
    pub site: String,
    /// Opaque structured payload from the producing backend.
    pub payload: serde_json::Value,
    /// The backend-assigned retrieval score (higher is better).
    pub retrieval_score: f64,
    /// Identifier of the backend that produced this item.
    pub source: String,
}

impl CandidateItem {
    /// Creates a candidate item.
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        site: impl Into<String>,
        payload: serde_json::Value,
        retrieval_score: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            site: site.into(),
            payload,
            retrieval_score,
            source: source.into(),
        }
    }
}

/// A candidate with its final score and rank position.
///
/// Produced by the ranking engine: results are totally ordered by
/// `score` descending, ties broken by original retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    /// The underlying candidate.
    pub item: CandidateItem,
    /// The final score assigned by the scoring strategy.
    pub score: f64,
    /// 1-based rank position in the final ordering.
    pub rank: usize,
}
