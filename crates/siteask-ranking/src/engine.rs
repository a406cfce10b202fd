use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use siteask_core::{CandidateItem, RankedResult};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::recorder::ScoreRecorder;
use crate::strategy::ScoringStrategy;

/// Reserved score marking "scoring failed", distinct from any real
/// score (strategies emit 0–100).
pub const SENTINEL_SCORE: f64 = -1000.0;

/// The per-invocation ranking state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingPhase {
    /// Created, not yet scoring.
    Pending,
    /// Scoring calls in flight.
    Scoring,
    /// At least one candidate scored (or there was nothing to score).
    Done,
    /// Every scoring call failed.
    Failed,
}

/// The outcome of one ranking invocation.
#[derive(Debug)]
pub struct RankingOutcome {
    /// All candidates, ranked. Failed candidates carry
    /// [`SENTINEL_SCORE`] and sink to the bottom — never silently
    /// dropped.
    pub results: Vec<RankedResult>,
    /// Number of candidates scored successfully.
    pub scored: usize,
    /// Number of candidates whose scoring call failed or timed out.
    pub failed: usize,
    /// Terminal phase: `Done`, or `Failed` when nothing scored.
    pub phase: RankingPhase,
}

/// Scores and orders merged candidates using a pluggable strategy.
///
/// Scoring calls run concurrently, bounded by a semaphore to respect
/// downstream rate limits, each under its own deadline. Ordering is a
/// stable descending sort: ties preserve original retrieval order.
pub struct RankingEngine {
    strategy: Arc<dyn ScoringStrategy>,
    max_concurrency: usize,
    score_timeout: Duration,
    recorder: Option<Arc<ScoreRecorder>>,
}

impl RankingEngine {
    /// Creates an engine with default concurrency (8) and deadline (5s).
    pub fn new(strategy: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            strategy,
            max_concurrency: 8,
            score_timeout: Duration::from_secs(5),
            recorder: None,
        }
    }

    /// Bounds concurrent scoring calls. Chainable.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// Sets the per-call deadline. Chainable.
    pub fn with_score_timeout(mut self, timeout: Duration) -> Self {
        self.score_timeout = timeout;
        self
    }

    /// Mirrors every scoring call to an audit recorder. Chainable.
    pub fn with_recorder(mut self, recorder: Arc<ScoreRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Ranks `items` against `query`.
    pub async fn rank(&self, query: &str, items: Vec<CandidateItem>) -> RankingOutcome {
        let mut phase = RankingPhase::Pending;
        debug!(strategy = self.strategy.name(), candidates = items.len(), ?phase, "ranking start");

        if items.is_empty() {
            return RankingOutcome {
                results: Vec::new(),
                scored: 0,
                failed: 0,
                phase: RankingPhase::Done,
            };
        }

        phase = RankingPhase::Scoring;
        debug!(?phase, "scoring candidates");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let calls = items.iter().map(|item| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                // Holding the permit across the call is the rate limit.
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (SENTINEL_SCORE, 0.0, false);
                    }
                };
                match tokio::time::timeout(self.score_timeout, self.strategy.score(query, item))
                    .await
                {
                    Ok(Ok(breakdown)) => (breakdown.score, breakdown.cost, true),
                    Ok(Err(e)) => {
                        warn!(url = %item.url, error = %e, "scoring call failed");
                        (SENTINEL_SCORE, 0.0, false)
                    }
                    Err(_) => {
                        warn!(url = %item.url, "scoring call timed out");
                        (SENTINEL_SCORE, 0.0, false)
                    }
                }
            }
        });

        let scores = join_all(calls).await;

        // The audit trail is a side channel: written after scoring,
        // and a write failure never affects the response.
        if let Some(recorder) = &self.recorder {
            for (item, (score, cost, _)) in items.iter().zip(scores.iter()) {
                if let Err(e) = recorder.record(query, &item.url, *score, *cost).await {
                    warn!(error = %e, "score audit write failed");
                    break;
                }
            }
        }

        let scored = scores.iter().filter(|(_, _, ok)| *ok).count();
        let failed = scores.len() - scored;

        // items and scores are index-aligned; the stable sort keeps
        // retrieval order for equal scores.
        let mut results: Vec<RankedResult> = items
            .into_iter()
            .zip(scores)
            .map(|(item, (score, _, _))| RankedResult {
                item,
                score,
                rank: 0,
            })
            .collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        for (position, result) in results.iter_mut().enumerate() {
            result.rank = position + 1;
        }

        phase = if scored == 0 {
            RankingPhase::Failed
        } else {
            RankingPhase::Done
        };
        info!(scored, failed, ?phase, "ranking complete");

        RankingOutcome {
            results,
            scored,
            failed,
            phase,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::strategy::ScoreBreakdown;
    use async_trait::async_trait;
    use siteask_core::{SiteaskError, SiteaskResult};

    fn item(url: &str) -> CandidateItem {
        CandidateItem::new(url, url, "s.example.com", serde_json::json!({}), 0.5, "test")
    }

    /// Scores by a number embedded in the URL; fails on "poison".
    struct UrlDigitScorer;

    #[async_trait]
    impl ScoringStrategy for UrlDigitScorer {
        fn name(&self) -> &str {
            "url_digit"
        }

        async fn score(&self, _query: &str, item: &CandidateItem) -> SiteaskResult<ScoreBreakdown> {
            if item.url.contains("poison") {
                return Err(SiteaskError::Scoring("provider rejected item".to_string()));
            }
            let digits: String = item.url.chars().filter(char::is_ascii_digit).collect();
            Ok(ScoreBreakdown {
                score: digits.parse().unwrap_or(0.0),
                cost: 0.1,
            })
        }
    }

    /// Gives every item the same score.
    struct ConstantScorer;

    #[async_trait]
    impl ScoringStrategy for ConstantScorer {
        fn name(&self) -> &str {
            "constant"
        }

        async fn score(&self, _query: &str, _item: &CandidateItem) -> SiteaskResult<ScoreBreakdown> {
            Ok(ScoreBreakdown {
                score: 42.0,
                cost: 0.0,
            })
        }
    }

    /// Never answers in time.
    struct StallingScorer;

    #[async_trait]
    impl ScoringStrategy for StallingScorer {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn score(&self, _query: &str, _item: &CandidateItem) -> SiteaskResult<ScoreBreakdown> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ScoreBreakdown {
                score: 0.0,
                cost: 0.0,
            })
        }
    }

    #[tokio::test]
    async fn test_failed_candidate_retained_with_sentinel() {
        let engine = RankingEngine::new(Arc::new(UrlDigitScorer));
        let items = vec![
            item("https://a/30"),
            item("https://a/poison"),
            item("https://a/90"),
            item("https://a/10"),
            item("https://a/50"),
        ];

        let outcome = engine.rank("q", items).await;

        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.scored, 4);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.phase, RankingPhase::Done);

        let last = outcome.results.last().unwrap();
        assert!(last.item.url.contains("poison"));
        assert_eq!(last.score, SENTINEL_SCORE);
        assert_eq!(last.rank, 5);
    }

    #[tokio::test]
    async fn test_descending_order_and_ranks() {
        let engine = RankingEngine::new(Arc::new(UrlDigitScorer));
        let items = vec![item("https://a/30"), item("https://a/90"), item("https://a/10")];

        let outcome = engine.rank("q", items).await;
        let scores: Vec<f64> = outcome.results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![90.0, 30.0, 10.0]);
        let ranks: Vec<usize> = outcome.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_ties_preserve_retrieval_order() {
        let engine = RankingEngine::new(Arc::new(ConstantScorer));
        let items = vec![item("https://a/first"), item("https://a/second"), item("https://a/third")];

        let outcome = engine.rank("q", items).await;
        let urls: Vec<&str> = outcome.results.iter().map(|r| r.item.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a/first", "https://a/second", "https://a/third"]
        );
    }

    #[tokio::test]
    async fn test_all_failures_is_failed_phase() {
        let engine = RankingEngine::new(Arc::new(UrlDigitScorer));
        let items = vec![item("https://a/poison"), item("https://b/poison")];

        let outcome = engine.rank("q", items).await;
        assert_eq!(outcome.phase, RankingPhase::Failed);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.results.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_is_done() {
        let engine = RankingEngine::new(Arc::new(ConstantScorer));
        let outcome = engine.rank("q", Vec::new()).await;
        assert_eq!(outcome.phase, RankingPhase::Done);
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_assigns_sentinel() {
        let engine = RankingEngine::new(Arc::new(StallingScorer))
            .with_score_timeout(Duration::from_millis(50));
        let outcome = engine.rank("q", vec![item("https://a/1")]).await;
        assert_eq!(outcome.results[0].score, SENTINEL_SCORE);
        assert_eq!(outcome.phase, RankingPhase::Failed);
    }

    #[tokio::test]
    async fn test_recorder_gets_every_call() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scores.jsonl");
        let recorder = Arc::new(ScoreRecorder::create(path.clone()).await.unwrap());

        let engine = RankingEngine::new(Arc::new(UrlDigitScorer)).with_recorder(recorder.clone());
        engine
            .rank("q", vec![item("https://a/30"), item("https://a/poison")])
            .await;
        recorder.flush().await.unwrap();

        let data = std::fs::read_to_string(&path).unwrap();
        assert_eq!(data.lines().count(), 2);
        // The failure audits too, as the sentinel.
        assert!(data.contains("-1000"));
    }
}
