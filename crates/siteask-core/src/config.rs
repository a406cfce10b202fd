use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{SiteaskError, SiteaskResult};

/// Configuration for one site in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEntry {
    /// Item types this site's content declares (e.g. "recipe",
    /// "product"). Drives cross-site fallback routing.
    pub item_types: Vec<String>,
    /// Keywords that mark a query as asking for one of this site's
    /// item types. Matched case-insensitively against query text.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Handler-level defaults parsed alongside the site table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerDefaults {
    /// Number of results to return per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Per-stage deadline in milliseconds.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    /// Whether to record every scoring call to the audit log.
    #[serde(default)]
    pub record_scores: bool,
    /// Audit log path, used when `record_scores` is set.
    #[serde(default)]
    pub score_log_path: Option<String>,
}

fn default_top_k() -> usize {
    10
}

fn default_stage_timeout_ms() -> u64 {
    8_000
}

impl Default for HandlerDefaults {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            stage_timeout_ms: default_stage_timeout_ms(),
            record_scores: false,
            score_log_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    defaults: Option<HandlerDefaults>,
    sites: HashMap<String, SiteEntry>,
}

/// The per-site item-type configuration table.
///
/// Loaded once at startup and treated as an immutable snapshot:
/// changing the table means building a new registry (and a new
/// router). Ordering of sites follows declaration order in the
/// source document so fallback routing is deterministic.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<(String, SiteEntry)>,
    defaults: HandlerDefaults,
}

impl SiteRegistry {
    /// Parses a registry from TOML configuration.
    ///
    /// Fails fast with a [`SiteaskError::Config`] on invalid TOML or
    /// an empty site table — a registry with no sites cannot route
    /// anything and is always a deployment mistake.
    pub fn from_toml(input: &str) -> SiteaskResult<Self> {
        let parsed: RegistryFile = toml::from_str(input)
            .map_err(|e| SiteaskError::Config(format!("invalid site registry: {e}")))?;

        if parsed.sites.is_empty() {
            return Err(SiteaskError::Config(
                "site registry declares no sites".to_string(),
            ));
        }

        // HashMap iteration order is unstable; fallback routing needs
        // a deterministic site order.
        let mut sites: Vec<(String, SiteEntry)> = parsed.sites.into_iter().collect();
        sites.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            sites,
            defaults: parsed.defaults.unwrap_or_default(),
        })
    }

    /// Builds a registry directly from entries. Mostly used by tests
    /// and embedding applications that configure programmatically.
    pub fn from_entries(entries: Vec<(String, SiteEntry)>, defaults: HandlerDefaults) -> Self {
        Self {
            sites: entries,
            defaults,
        }
    }

    /// Handler defaults parsed alongside the table.
    pub fn defaults(&self) -> &HandlerDefaults {
        &self.defaults
    }

    /// Whether `site` is present in the table.
    pub fn contains_site(&self, site: &str) -> bool {
        self.sites.iter().any(|(name, _)| name == site)
    }

    /// Every site whose configuration declares `item_type`, in table
    /// order.
    pub fn sites_for_item_type(&self, item_type: &str) -> Vec<String> {
        self.sites
            .iter()
            .filter(|(_, entry)| entry.item_types.iter().any(|t| t == item_type))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Infers the item type a query is asking for by matching registry
    /// keywords against the query text. Returns the first item type of
    /// the first site with a keyword hit, or `None`.
    pub fn infer_item_type(&self, query_text: &str) -> Option<String> {
        let lowered = query_text.to_lowercase();
        for (_, entry) in &self.sites {
            let hit = entry
                .keywords
                .iter()
                .any(|kw| lowered.contains(&kw.to_lowercase()));
            if hit {
                if let Some(first) = entry.item_types.first() {
                    return Some(first.clone());
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [defaults]
        top_k = 5
        record_scores = true
        score_log_path = "/tmp/scores.jsonl"

        [sites."recipes.example.com"]
        item_types = ["recipe"]
        keywords = ["recipe", "cook", "bake"]

        [sites."outdoors.example.com"]
        item_types = ["product", "guide"]
        keywords = ["tent", "hiking"]
    "#;

    #[test]
    fn test_parse_registry() {
        let reg = SiteRegistry::from_toml(SAMPLE).unwrap();
        assert!(reg.contains_site("recipes.example.com"));
        assert_eq!(reg.defaults().top_k, 5);
        assert!(reg.defaults().record_scores);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = SiteRegistry::from_toml("sites = 3").unwrap_err();
        assert!(matches!(err, SiteaskError::Config(_)));
    }

    #[test]
    fn test_empty_table_rejected() {
        let err = SiteRegistry::from_toml("[sites]").unwrap_err();
        assert!(err.to_string().contains("no sites"));
    }

    #[test]
    fn test_sites_for_item_type() {
        let reg = SiteRegistry::from_toml(SAMPLE).unwrap();
        assert_eq!(
            reg.sites_for_item_type("recipe"),
            vec!["recipes.example.com"]
        );
        assert_eq!(
            reg.sites_for_item_type("guide"),
            vec!["outdoors.example.com"]
        );
        assert!(reg.sites_for_item_type("podcast").is_empty());
    }

    #[test]
    fn test_infer_item_type_from_keywords() {
        let reg = SiteRegistry::from_toml(SAMPLE).unwrap();
        assert_eq!(
            reg.infer_item_type("how do I bake sourdough").as_deref(),
            Some("recipe")
        );
        assert_eq!(
            reg.infer_item_type("lightweight Tent for two").as_deref(),
            Some("product")
        );
        assert!(reg.infer_item_type("latest stock prices").is_none());
    }
}
