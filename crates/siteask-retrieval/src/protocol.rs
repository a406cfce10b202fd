//! JSON-RPC 2.0 wire types for the remote catalog retrieval protocol.

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request id, unique per client.
    pub id: u64,
    /// Method name; catalog search uses `tools/call`.
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Builds a request envelope.
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version echoed by the server.
    #[allow(dead_code)]
    pub jsonrpc: String,
    /// Request id this responds to.
    pub id: Option<u64>,
    /// Success payload.
    pub result: Option<serde_json::Value>,
    /// Error payload, mutually exclusive with `result`.
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    pub data: Option<serde_json::Value>,
}

/// Extracts the product list from a catalog `tools/call` result.
///
/// Servers respond in one of two shapes: a direct `products` array on
/// the result, or a JSON-encoded string inside the first content
/// block (`result.content[0].text`) that itself contains the array
/// (either bare or under a `products` key). An absent or malformed
/// list is zero results, not an error.
pub fn extract_products(result: &serde_json::Value) -> Vec<serde_json::Value> {
    if let Some(products) = result.get("products").and_then(|p| p.as_array()) {
        return products.clone();
    }

    let nested = result
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("text"))
        .and_then(|t| t.as_str())
        .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok());

    match nested {
        Some(serde_json::Value::Array(items)) => items,
        Some(obj) => obj
            .get("products")
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    }
}
