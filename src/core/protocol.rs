/// MCP Protocol Types
///
/// JSON-RPC 2.0 request/response envelopes and the result payloads of the
/// three supported methods.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// MCP protocol revision announced by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request.
///
/// `id` is opaque: it is echoed back verbatim and never inspected. A missing
/// id is treated as `null`.
#[derive(Deserialize, Debug, Clone)]
pub struct McpRequest {
    /// JSON-RPC version identifier, expected to be "2.0"; not enforced
    #[serde(default)]
    pub jsonrpc: String,
    /// Request ID echoed in the response; `null` when absent
    #[serde(default)]
    pub id: Value,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    #[serde(default)]
    pub method: String,
    /// Method-specific parameters as JSON value
    #[serde(default)]
    pub params: Option<Value>,
}

impl McpRequest {
    /// `params` when it is a JSON object.
    pub fn params_object(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref().and_then(Value::as_object)
    }
}

/// JSON-RPC 2.0 response.
///
/// Result and error are two variants of one enum, so a response carries
/// exactly one of them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct McpResponse {
    /// JSON-RPC version identifier, always "2.0"
    pub jsonrpc: String,
    /// Request ID from the original request
    #[serde(default)]
    pub id: Value,
    /// Serialized as a top-level `result` or `error` member
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Method-specific result payload
    Result(Value),
    /// Protocol-level failure
    Error(McpError),
}

impl McpResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Error(McpError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Encode for the wire. Falls back to a fixed internal-error document if
    /// the result payload cannot be encoded.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| {
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{INTERNAL_ERROR},"message":"Internal error"}}}}"#
            )
            .into_bytes()
        })
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct McpError {
    /// JSON-RPC error code (e.g., -32601 for method not found)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Server identification returned by `initialize`.
#[derive(Serialize, Debug, Clone)]
pub struct ServerInfo {
    /// Server name as configured at startup
    pub name: String,
    /// Server version string
    pub version: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ToolsCapability {
    /// Whether `notifications/tools/list_changed` is sent; always false
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct ServerCapabilities {
    /// Tool listing and calling are supported
    pub tools: ToolsCapability,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// MCP protocol revision, see `PROTOCOL_VERSION`
    pub protocol_version: &'static str,
    /// Name and version of this gateway
    pub server_info: ServerInfo,
    /// Declared server capabilities
    pub capabilities: ServerCapabilities,
    /// Server description, omitted when empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// One entry of the `content` list of a tool result.
#[derive(Serialize, Debug, Clone)]
pub struct ContentItem {
    /// Content type; the gateway only produces "text"
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Text payload
    pub text: String,
}

impl ContentItem {
    pub fn text(text: String) -> Self {
        Self { kind: "text", text }
    }
}

/// Result of `tools/call`. Action failures are reported here, not as
/// JSON-RPC errors.
#[derive(Serialize, Debug, Clone)]
pub struct CallToolResult {
    /// Single text item carrying the action's output or error line
    pub content: Vec<ContentItem>,
    /// True when the action reported a status of 400 or above
    #[serde(rename = "isError")]
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_and_error_are_mutually_exclusive_on_the_wire() {
        let ok: Value = serde_json::from_slice(&McpResponse::success(json!(1), json!({ "a": 1 })).to_bytes()).unwrap();
        assert_eq!(ok, json!({ "jsonrpc": "2.0", "id": 1, "result": { "a": 1 } }));

        let err: Value =
            serde_json::from_slice(&McpResponse::error(json!("x"), METHOD_NOT_FOUND, "Method not found").to_bytes())
                .unwrap();
        assert_eq!(
            err,
            json!({ "jsonrpc": "2.0", "id": "x", "error": { "code": -32601, "message": "Method not found" } })
        );
    }

    #[test]
    fn request_without_id_echoes_null() {
        let req: McpRequest = serde_json::from_str(r#"{"method":"tools/list"}"#).unwrap();
        assert_eq!(req.id, Value::Null);
        assert!(req.params_object().is_none());
    }
}
