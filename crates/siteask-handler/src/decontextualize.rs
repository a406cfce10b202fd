use async_trait::async_trait;
use siteask_core::{Query, SiteaskResult};

/// Rewrites a conversational query into a standalone one using the
/// prior turns carried on the query.
///
/// The production rewriter is an LLM call behind this seam; its wire
/// format is an external collaborator's concern. Implementations must
/// be side-effect-free with respect to the conversation itself.
#[async_trait]
pub trait Decontextualizer: Send + Sync {
    /// Produces the standalone query text.
    async fn decontextualize(&self, query: &Query) -> SiteaskResult<String>;
}

/// Returns the query text unchanged. The right default for standalone
/// queries and for deployments without a rewriter.
pub struct Passthrough;

#[async_trait]
impl Decontextualizer for Passthrough {
    async fn decontextualize(&self, query: &Query) -> SiteaskResult<String> {
        Ok(query.text.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_ignores_turns() {
        let query = Query::new("what about the second one", "shop.example.com")
            .with_prev_turns(vec!["show me trail shoes".to_string()]);
        let text = Passthrough.decontextualize(&query).await.unwrap();
        assert_eq!(text, "what about the second one");
    }
}
