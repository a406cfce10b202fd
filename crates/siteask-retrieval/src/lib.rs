//! Retrieval backends and routing for siteask.
//!
//! A [`RetrievalBackend`] declares — cheaply, before any network I/O —
//! whether it can serve a site, and retrieves candidate items under a
//! caller-supplied timeout. The [`RetrievalRouter`] probes registered
//! backends in order, falls back to cross-site routing through the
//! site registry, fans out concurrently, and merges partial results:
//! one failing backend never fails the query.
//!
//! Backends provided here:
//!
//! - [`VectorBackend`] — local ANN shard (or remote vector service)
//!   behind the uniform `VectorStore` interface.
//! - [`CatalogBackend`] — remote catalog search over JSON-RPC
//!   `tools/call`.

/// The backend trait and site pattern matching.
pub mod backend;
/// Remote catalog JSON-RPC backend.
pub mod catalog;
/// Vector-store-backed shard backend.
pub mod local;
/// JSON-RPC wire types for the catalog protocol.
pub mod protocol;
/// Fan-out routing and result merging.
pub mod router;

pub use backend::{site_matches, RetrievalBackend};
pub use catalog::CatalogBackend;
pub use local::{ShardDoc, VectorBackend};
pub use router::{MergedCandidates, RetrievalRouter};
