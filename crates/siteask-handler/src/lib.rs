//! The top-level query state machine for siteask.
//!
//! A [`QueryHandler`] ties the pieces together per incoming query:
//! decontextualize, route retrieval across backends, rank the merged
//! candidates, and optionally record the turn into a conversation.
//! Specialized behaviors ("who can answer this" routing, forcing a
//! fixed site) are plain configuration on a [`QueryPlan`] — there is
//! one handler implementation, not a subclass per mode.
//!
//! The [`ConversationClient`] consumes the external conversation HTTP
//! surface; it is a client only, the server belongs to another
//! system.

/// The consumed conversation HTTP surface.
pub mod chat_client;
/// The query-rewriting seam.
pub mod decontextualize;
/// The query state machine.
pub mod handler;

pub use chat_client::{ConversationClient, CreatedConversation};
pub use decontextualize::{Decontextualizer, Passthrough};
pub use handler::{Answer, QueryHandler, QueryPlan, QueryResponse, QueryState};
