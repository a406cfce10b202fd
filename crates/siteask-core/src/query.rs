use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{SiteaskError, SiteaskResult};

/// A per-request parameter bag with typed accessors.
///
/// Parameters arrive as loose JSON values; every accessor takes an
/// explicit default and fails with a [`SiteaskError::Config`] when the
/// stored value has the wrong type. A missing key is not an error —
/// the default is returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestParams(HashMap<String, serde_json::Value>);

impl RequestParams {
    /// Creates an empty parameter bag.
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Sets a parameter value. Chainable.
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Returns the string parameter `key`, or `default` if absent.
    pub fn str_param(&self, key: &str, default: &str) -> SiteaskResult<String> {
        match self.0.get(key) {
            None => Ok(default.to_string()),
            Some(serde_json::Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(Self::type_error(key, "string", other)),
        }
    }

    /// Returns the integer parameter `key`, or `default` if absent.
    pub fn int_param(&self, key: &str, default: i64) -> SiteaskResult<i64> {
        match self.0.get(key) {
            None => Ok(default),
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| Self::type_error(key, "integer", &self.0[key])),
            Some(other) => Err(Self::type_error(key, "integer", other)),
        }
    }

    /// Returns the float parameter `key`, or `default` if absent.
    ///
    /// Integer values are widened to f64.
    pub fn float_param(&self, key: &str, default: f64) -> SiteaskResult<f64> {
        match self.0.get(key) {
            None => Ok(default),
            Some(serde_json::Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| Self::type_error(key, "float", &self.0[key])),
            Some(other) => Err(Self::type_error(key, "float", other)),
        }
    }

    /// Returns the boolean parameter `key`, or `default` if absent.
    pub fn bool_param(&self, key: &str, default: bool) -> SiteaskResult<bool> {
        match self.0.get(key) {
            None => Ok(default),
            Some(serde_json::Value::Bool(b)) => Ok(*b),
            Some(other) => Err(Self::type_error(key, "bool", other)),
        }
    }

    /// Returns the string-list parameter `key`, or `default` if absent.
    ///
    /// Every element must be a string; a mixed-type list is a
    /// configuration error.
    pub fn list_param(&self, key: &str, default: &[&str]) -> SiteaskResult<Vec<String>> {
        match self.0.get(key) {
            None => Ok(default.iter().map(|s| (*s).to_string()).collect()),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => Ok(s.clone()),
                    other => Err(Self::type_error(key, "list of strings", other)),
                })
                .collect(),
            Some(other) => Err(Self::type_error(key, "list of strings", other)),
        }
    }

    fn type_error(key: &str, expected: &str, got: &serde_json::Value) -> SiteaskError {
        SiteaskError::Config(format!(
            "parameter '{}' expected {}, got {}",
            key,
            expected,
            json_type_name(got)
        ))
    }
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// An incoming user query bound to a target site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// The raw query text as typed by the user.
    pub text: String,
    /// The target content collection ("site") identifier.
    pub site: String,
    /// Prior conversation turns, oldest first, used for
    /// decontextualization. Empty for a standalone query.
    #[serde(default)]
    pub prev_turns: Vec<String>,
    /// The per-request parameter bag.
    #[serde(default)]
    pub params: RequestParams,
}

impl Query {
    /// Creates a standalone query against `site`.
    pub fn new(text: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            site: site.into(),
            prev_turns: Vec::new(),
            params: RequestParams::new(),
        }
    }

    /// Attaches prior conversation turns. Chainable.
    pub fn with_prev_turns(mut self, turns: Vec<String>) -> Self {
        self.prev_turns = turns;
        self
    }

    /// Attaches a parameter bag. Chainable.
    pub fn with_params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }
}
