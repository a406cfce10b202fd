//! Core types and error definitions for the siteask orchestrator.
//!
//! This crate provides the foundational types shared across all siteask
//! crates: the unified error enum, the query and candidate data model,
//! and the site registry configuration.
//!
//! # Main types
//!
//! - [`SiteaskError`] — Unified error enum for all siteask subsystems.
//! - [`SiteaskResult`] — Convenience alias for `Result<T, SiteaskError>`.
//! - [`Query`] — An incoming user query bound to a target site.
//! - [`RequestParams`] — Typed accessors over a per-request parameter bag.
//! - [`CandidateItem`] — A retrieval candidate produced by a backend.
//! - [`RankedResult`] — A candidate with its final score and rank.
//! - [`SiteRegistry`] — The per-site item-type configuration table.

/// Site registry and orchestrator configuration.
pub mod config;
/// Retrieval candidates and ranked results.
pub mod item;
/// Queries and the typed request parameter bag.
pub mod query;

pub use config::{HandlerDefaults, SiteEntry, SiteRegistry};
pub use item::{CandidateItem, RankedResult};
pub use query::{Query, RequestParams};

/// Top-level error type for the siteask orchestrator.
///
/// Each variant corresponds to a failure class from the error taxonomy:
/// configuration errors are fatal and surfaced immediately, while
/// retrieval and scoring failures are partial by design — the caller
/// decides whether enough of the query survived.
#[derive(Debug, thiserror::Error)]
pub enum SiteaskError {
    /// A bad parameter type, site mapping, or index artifact. Fatal,
    /// never retried.
    #[error("Config error: {0}")]
    Config(String),

    /// A timeout or transport error on one retrieval backend. The
    /// backend's contribution is empty; the query proceeds.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// One candidate's scoring call failed. The candidate is retained
    /// with a sentinel score; the query proceeds.
    #[error("Scoring error: {0}")]
    Scoring(String),

    /// A conversation's message queue limit was exceeded. The message
    /// is rejected; the conversation is unaffected.
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// A persistence read or write failed. In-memory session state is
    /// not corrupted by a failed persist attempt.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`SiteaskError`].
pub type SiteaskResult<T> = Result<T, SiteaskError>;
