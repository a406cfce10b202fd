use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siteask_core::{CandidateItem, SiteRegistry, SiteaskResult};

/// The outcome of scoring one candidate against a query.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBreakdown {
    /// Relevance score on the 0–100 scale.
    pub score: f64,
    /// Cost attributed to the scoring call (e.g. tokens, dollars).
    /// Zero for local strategies.
    pub cost: f64,
}

/// A pluggable scoring function: `(query, item) -> (score, cost)`.
///
/// Implementations may call out to an LLM or scoring service; the
/// engine bounds their concurrency and wraps each call in a deadline.
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    /// Stable identifier for logs and the audit trail.
    fn name(&self) -> &str;

    /// Score `item` against `query`.
    async fn score(&self, query: &str, item: &CandidateItem) -> SiteaskResult<ScoreBreakdown>;
}

/// Which scoring strategy a query runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    /// Default relevance ranking of items against the query.
    Relevance,
    /// "Who can answer this query" routing: rank by how strongly the
    /// item's owning site claims the query's topic.
    SiteRouting,
}

/// Resolves a mode to its strategy.
pub fn strategy_for(mode: RankingMode, registry: Arc<SiteRegistry>) -> Arc<dyn ScoringStrategy> {
    match mode {
        RankingMode::Relevance => Arc::new(LexicalRelevance),
        RankingMode::SiteRouting => Arc::new(SiteAffinity::new(registry)),
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_string)
        .collect()
}

/// Default relevance scorer: lexical overlap between the query and
/// the candidate's name and payload text.
///
/// Deterministic and local — the production deployment swaps an
/// LLM-backed strategy in behind [`ScoringStrategy`]; this one keeps
/// the pipeline exercised end to end without a provider.
pub struct LexicalRelevance;

#[async_trait]
impl ScoringStrategy for LexicalRelevance {
    fn name(&self) -> &str {
        "lexical_relevance"
    }

    async fn score(&self, query: &str, item: &CandidateItem) -> SiteaskResult<ScoreBreakdown> {
        let query_tokens = tokens(query);
        if query_tokens.is_empty() {
            return Ok(ScoreBreakdown {
                score: 0.0,
                cost: 0.0,
            });
        }

        let name_tokens = tokens(&item.name);
        let payload_tokens = tokens(&item.payload.to_string());

        let name_hits = query_tokens.intersection(&name_tokens).count() as f64;
        let payload_hits = query_tokens.intersection(&payload_tokens).count() as f64;
        let total = query_tokens.len() as f64;

        let score = (name_hits / total) * 70.0 + (payload_hits / total) * 30.0;
        Ok(ScoreBreakdown {
            score: score.min(100.0),
            cost: 0.0,
        })
    }
}

/// Site-routing scorer: how strongly does the candidate's owning site
/// claim the query's topic, per the registry's item types and
/// keywords.
pub struct SiteAffinity {
    registry: Arc<SiteRegistry>,
}

impl SiteAffinity {
    /// Creates the scorer over a registry snapshot.
    pub fn new(registry: Arc<SiteRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ScoringStrategy for SiteAffinity {
    fn name(&self) -> &str {
        "site_affinity"
    }

    async fn score(&self, query: &str, item: &CandidateItem) -> SiteaskResult<ScoreBreakdown> {
        // A site that declares the query's inferred item type is a
        // strong answer-routing signal; an unknown site is a weak one.
        let inferred = self.registry.infer_item_type(query);
        let score = match inferred {
            Some(item_type) => {
                let declaring = self.registry.sites_for_item_type(&item_type);
                if declaring.iter().any(|s| s == &item.site) {
                    90.0
                } else if self.registry.contains_site(&item.site) {
                    40.0
                } else {
                    10.0
                }
            }
            None => {
                if self.registry.contains_site(&item.site) {
                    50.0
                } else {
                    10.0
                }
            }
        };
        Ok(ScoreBreakdown { score, cost: 0.0 })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use siteask_core::{HandlerDefaults, SiteEntry};
    use serde_json::json;

    fn item(name: &str, site: &str) -> CandidateItem {
        CandidateItem::new(
            format!("https://{site}/x"),
            name,
            site,
            json!({}),
            0.5,
            "test",
        )
    }

    fn registry() -> Arc<SiteRegistry> {
        Arc::new(SiteRegistry::from_entries(
            vec![
                (
                    "recipes.example.com".to_string(),
                    SiteEntry {
                        item_types: vec!["recipe".to_string()],
                        keywords: vec!["bake".to_string()],
                    },
                ),
                (
                    "news.example.com".to_string(),
                    SiteEntry {
                        item_types: vec!["article".to_string()],
                        keywords: vec![],
                    },
                ),
            ],
            HandlerDefaults::default(),
        ))
    }

    #[tokio::test]
    async fn test_lexical_relevance_orders_by_overlap() {
        let strategy = LexicalRelevance;
        let close = strategy
            .score("sourdough bread", &item("Sourdough bread recipe", "s"))
            .await
            .unwrap();
        let far = strategy
            .score("sourdough bread", &item("Carbon fiber bike", "s"))
            .await
            .unwrap();
        assert!(close.score > far.score);
        assert_eq!(close.cost, 0.0);
    }

    #[tokio::test]
    async fn test_lexical_relevance_empty_query() {
        let strategy = LexicalRelevance;
        let b = strategy.score("", &item("Anything", "s")).await.unwrap();
        assert_eq!(b.score, 0.0);
    }

    #[tokio::test]
    async fn test_site_affinity_prefers_declaring_site() {
        let strategy = SiteAffinity::new(registry());
        let declaring = strategy
            .score("how to bake rye", &item("Rye", "recipes.example.com"))
            .await
            .unwrap();
        let known = strategy
            .score("how to bake rye", &item("Rye piece", "news.example.com"))
            .await
            .unwrap();
        let unknown = strategy
            .score("how to bake rye", &item("Rye", "random.example.net"))
            .await
            .unwrap();
        assert!(declaring.score > known.score);
        assert!(known.score > unknown.score);
    }

    #[tokio::test]
    async fn test_strategy_for_mode() {
        let relevance = strategy_for(RankingMode::Relevance, registry());
        assert_eq!(relevance.name(), "lexical_relevance");
        let routing = strategy_for(RankingMode::SiteRouting, registry());
        assert_eq!(routing.name(), "site_affinity");
    }
}
