use std::sync::Arc;
use std::time::{Duration, Instant};

use siteask_core::{Query, RankedResult, SiteRegistry, SiteaskResult};
use siteask_ranking::{strategy_for, RankingEngine, RankingMode, RankingPhase, ScoreRecorder};
use siteask_retrieval::RetrievalRouter;
use siteask_session::SessionManager;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decontextualize::Decontextualizer;

/// The per-query state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Accepted, not yet started.
    Pending,
    /// Resolving the conversational query into a standalone one.
    Decontextualizing,
    /// Fanning out to retrieval backends.
    Retrieving,
    /// Scoring and ordering candidates.
    Ranking,
    /// Finished with an answer (results or a clean zero matches).
    Done,
    /// Finished without an answer: every backend or every scoring
    /// call failed.
    Failed,
}

/// Strategy object configuring one handler invocation.
///
/// Specialized modes are parameters here — ranking mode and site
/// forcing are explicit, not inheritance overrides.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Which scoring strategy ranks the candidates.
    pub ranking_mode: RankingMode,
    /// When set, overrides the query's target site (the "who can
    /// answer this" flow pins a designated aggregation site).
    pub force_site: Option<String>,
    /// Results to return.
    pub top_k: usize,
    /// Deadline applied to each pipeline stage.
    pub stage_timeout: Duration,
}

impl Default for QueryPlan {
    fn default() -> Self {
        Self {
            ranking_mode: RankingMode::Relevance,
            force_site: None,
            top_k: 10,
            stage_timeout: Duration::from_secs(8),
        }
    }
}

impl QueryPlan {
    /// Builds a plan from the registry's parsed handler defaults.
    pub fn from_defaults(defaults: &siteask_core::HandlerDefaults) -> Self {
        Self {
            ranking_mode: RankingMode::Relevance,
            force_site: None,
            top_k: defaults.top_k,
            stage_timeout: Duration::from_millis(defaults.stage_timeout_ms),
        }
    }

    /// Selects the ranking mode. Chainable.
    pub fn with_ranking_mode(mut self, mode: RankingMode) -> Self {
        self.ranking_mode = mode;
        self
    }

    /// Pins the target site. Chainable.
    pub fn with_forced_site(mut self, site: impl Into<String>) -> Self {
        self.force_site = Some(site.into());
        self
    }

    /// Sets the result count. Chainable.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the per-stage deadline. Chainable.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }
}

/// The final answer of one query.
#[derive(Debug)]
pub enum Answer {
    /// Ranked results, best first.
    Results(Vec<RankedResult>),
    /// Backends responded and found nothing.
    NoMatches,
    /// No answer available: nothing could retrieve, or nothing could
    /// score. Distinct from zero matches.
    NoAnswer,
}

/// Everything the caller gets back from one invocation.
#[derive(Debug)]
pub struct QueryResponse {
    /// The answer.
    pub answer: Answer,
    /// Terminal state of the query state machine.
    pub state: QueryState,
    /// The standalone query text retrieval actually ran with.
    pub resolved_query: String,
    /// Set when recording the turn into a conversation failed; the
    /// answer itself is unaffected.
    pub recording_error: Option<String>,
}

/// The top-level query orchestrator.
///
/// One instance serves many concurrent queries; every stage awaits
/// without blocking other in-flight queries, and within one query the
/// stages run strictly in order.
pub struct QueryHandler {
    decontextualizer: Arc<dyn Decontextualizer>,
    router: Arc<RetrievalRouter>,
    registry: Arc<SiteRegistry>,
    sessions: Option<Arc<SessionManager>>,
    recorder: Option<Arc<ScoreRecorder>>,
}

impl QueryHandler {
    /// Creates a handler over a router and registry.
    pub fn new(
        decontextualizer: Arc<dyn Decontextualizer>,
        router: Arc<RetrievalRouter>,
        registry: Arc<SiteRegistry>,
    ) -> Self {
        Self {
            decontextualizer,
            router,
            registry,
            sessions: None,
            recorder: None,
        }
    }

    /// Attaches conversation persistence. Chainable.
    pub fn with_sessions(mut self, sessions: Arc<SessionManager>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Attaches a score audit recorder, threaded into every ranking
    /// run. Chainable.
    pub fn with_recorder(mut self, recorder: Arc<ScoreRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Answers one query under `plan`.
    pub async fn answer(&self, query: Query, plan: &QueryPlan) -> SiteaskResult<QueryResponse> {
        let started = Instant::now();
        let mut state = QueryState::Pending;
        debug!(site = %query.site, ?state, "query accepted");

        // --- Decontextualize ---
        state = QueryState::Decontextualizing;
        debug!(?state, "resolving standalone query");
        let resolved = match tokio::time::timeout(
            plan.stage_timeout,
            self.decontextualizer.decontextualize(&query),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                // A failed rewrite degrades to the raw text; retrieval
                // still has something to work with.
                warn!(error = %e, "decontextualization failed, using raw query");
                query.text.clone()
            }
            Err(_) => {
                warn!("decontextualization timed out, using raw query");
                query.text.clone()
            }
        };

        let mut routed_query = query;
        routed_query.text = resolved.clone();
        if let Some(site) = &plan.force_site {
            debug!(forced_site = %site, "plan forces target site");
            routed_query.site = site.clone();
        }

        // --- Retrieve ---
        state = QueryState::Retrieving;
        debug!(?state, site = %routed_query.site, "routing retrieval");
        let merged = self.router.route(&routed_query, plan.top_k * 3).await;

        if merged.attempted == 0 || merged.all_failed() {
            info!(
                attempted = merged.attempted,
                failed = merged.failed,
                "no backend produced candidates; no answer available"
            );
            return Ok(QueryResponse {
                answer: Answer::NoAnswer,
                state: QueryState::Failed,
                resolved_query: resolved,
                recording_error: None,
            });
        }

        if merged.items.is_empty() {
            info!("backends responded with zero matches");
            return Ok(QueryResponse {
                answer: Answer::NoMatches,
                state: QueryState::Done,
                resolved_query: resolved,
                recording_error: None,
            });
        }

        // --- Rank ---
        state = QueryState::Ranking;
        debug!(?state, candidates = merged.items.len(), "ranking candidates");
        let strategy = strategy_for(plan.ranking_mode, Arc::clone(&self.registry));
        let mut engine =
            RankingEngine::new(strategy).with_score_timeout(plan.stage_timeout);
        if let Some(recorder) = &self.recorder {
            engine = engine.with_recorder(Arc::clone(recorder));
        }

        let outcome = engine.rank(&resolved, merged.items).await;
        if outcome.phase == RankingPhase::Failed {
            info!("every scoring call failed; no answer available");
            return Ok(QueryResponse {
                answer: Answer::NoAnswer,
                state: QueryState::Failed,
                resolved_query: resolved,
                recording_error: None,
            });
        }

        let mut results = outcome.results;
        results.truncate(plan.top_k);

        info!(
            results = results.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "query answered"
        );

        Ok(QueryResponse {
            answer: Answer::Results(results),
            state: QueryState::Done,
            resolved_query: resolved,
            recording_error: None,
        })
    }

    /// Answers one query and records the turn into `conversation`.
    ///
    /// A capacity or storage failure while recording surfaces in
    /// `recording_error` — the computed answer is never discarded
    /// because persistence misbehaved.
    pub async fn answer_in_conversation(
        &self,
        query: Query,
        plan: &QueryPlan,
        conversation: Uuid,
    ) -> SiteaskResult<QueryResponse> {
        let mut response = self.answer(query, plan).await?;

        if matches!(response.answer, Answer::Results(_)) {
            if let Some(sessions) = &self.sessions {
                if let Err(e) = sessions.append_message(conversation).await {
                    warn!(conversation = %conversation, error = %e, "failed to record turn");
                    response.recording_error = Some(e.to_string());
                }
            }
        }

        Ok(response)
    }
}
