//! Candidate ranking for siteask.
//!
//! The [`RankingEngine`] runs one state machine per invocation
//! (`Pending → Scoring → Done | Failed`), scoring candidates
//! concurrently through a pluggable [`ScoringStrategy`] under a
//! bounded concurrency limit. A candidate whose scoring call fails is
//! never dropped — it keeps its place with [`SENTINEL_SCORE`], so
//! callers and tests can tell "scored poorly" from "never scored".
//!
//! Scoring can be mirrored to an append-only audit log through an
//! explicit [`ScoreRecorder`] handle; recording is a side channel and
//! never sits on the critical path of a response.

/// The ranking state machine.
pub mod engine;
/// Append-only score audit log.
pub mod recorder;
/// Scoring strategies and mode selection.
pub mod strategy;

pub use engine::{RankingEngine, RankingOutcome, RankingPhase, SENTINEL_SCORE};
pub use recorder::ScoreRecorder;
pub use strategy::{strategy_for, LexicalRelevance, RankingMode, ScoreBreakdown, ScoringStrategy, SiteAffinity};
