use std::time::Duration;

use async_trait::async_trait;
use siteask_core::{CandidateItem, Query, SiteaskResult};

/// A retrieval backend: one source of candidate items.
///
/// `can_handle` is a cheap, side-effect-free capability probe
/// evaluated before any network call. `retrieve` may perform network
/// I/O and must apply the caller-supplied timeout; on timeout or
/// transport error it returns a retrieval error, never a partial
/// result — the router treats that as "this backend abstained", not
/// as "zero results found".
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Stable identifier for logs and `CandidateItem::source`.
    fn name(&self) -> &str;

    /// Whether this backend can serve `site`. Must not perform I/O.
    fn can_handle(&self, site: &str) -> bool;

    /// Retrieve up to `limit` candidates for `query` against `site`,
    /// finishing within `timeout`.
    async fn retrieve(
        &self,
        query: &Query,
        site: &str,
        limit: usize,
        timeout: Duration,
    ) -> SiteaskResult<Vec<CandidateItem>>;
}

/// Matches a site against a backend's domain pattern.
///
/// `*.suffix` patterns match any subdomain of `suffix` (and `suffix`
/// itself); anything else is an exact, case-insensitive comparison.
pub fn site_matches(pattern: &str, site: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let site = site.to_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => site == suffix || site.ends_with(&format!(".{suffix}")),
        None => pattern == site,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(site_matches("shop.example.com", "shop.example.com"));
        assert!(site_matches("Shop.Example.com", "shop.example.com"));
        assert!(!site_matches("shop.example.com", "blog.example.com"));
    }

    #[test]
    fn test_suffix_pattern() {
        assert!(site_matches("*.myshopify.com", "foo.myshopify.com"));
        assert!(site_matches("*.myshopify.com", "myshopify.com"));
        assert!(!site_matches("*.myshopify.com", "myshopify.com.evil.net"));
        assert!(!site_matches("*.myshopify.com", "example.com"));
    }
}
