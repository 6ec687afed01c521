//! MCP JSON-RPC message shapes and result decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{SessionError, SessionResult};

/// Protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const CLIENT_NAME: &str = "toolchat";

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> RpcRequest<'a> {
    pub(crate) fn call(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params: Some(params),
        }
    }

    pub(crate) fn notification(method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method,
            params: None,
        }
    }
}

/// Any line the server writes: a response, a notification, or a request of
/// its own.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcMessage {
    #[serde(default)]
    pub(crate) id: Option<Value>,
    #[serde(default)]
    pub(crate) method: Option<String>,
    #[serde(default)]
    pub(crate) result: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<RpcError>,
}

impl RpcMessage {
    pub(crate) fn answers(&self, id: u64) -> bool {
        self.method.is_none() && self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    #[serde(default)]
    pub(crate) code: i64,
    #[serde(default)]
    pub(crate) message: String,
}

/// Tool advertised by a backend in its `tools/list` answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Name used in `tools/call`.
    pub name: String,
    /// Human readable summary, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolList {
    #[serde(default)]
    tools: Vec<ToolInfo>,
}

pub(crate) fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

pub(crate) fn call_params(tool: &str, arguments: Map<String, Value>) -> Value {
    json!({ "name": tool, "arguments": arguments })
}

pub(crate) fn decode_tool_list(label: &str, result: Value) -> SessionResult<Vec<ToolInfo>> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value::<ToolList>(result)
        .map(|list| list.tools)
        .map_err(|err| SessionError::protocol(label, format!("malformed tools/list result: {err}")))
}

/// Turns a `tools/call` result into the text shown to the user.
///
/// Text blocks are joined with newlines; a result without any text block is
/// rendered as JSON. `isError: true` becomes [`SessionError::Tool`].
pub(crate) fn render_call_result(label: &str, tool: &str, result: &Value) -> SessionResult<String> {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    let text = if texts.is_empty() {
        result.to_string()
    } else {
        texts.join("\n")
    };

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return Err(SessionError::Tool {
            label: label.to_owned(),
            tool: tool.to_owned(),
            message: text,
        });
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_omit_id_and_params() {
        let line = serde_json::to_string(&RpcRequest::notification("notifications/initialized"))
            .unwrap();
        assert_eq!(line, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);

        let call = serde_json::to_value(RpcRequest::call(1, "initialize", initialize_params()))
            .unwrap();
        assert_eq!(call["id"], 1);
        assert_eq!(call["params"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(call["params"]["clientInfo"]["name"], "toolchat");
    }

    #[test]
    fn only_matching_responses_answer() {
        let response: RpcMessage = serde_json::from_str(r#"{"jsonrpc":"2.0","id":2,"result":{}}"#).unwrap();
        assert!(response.answers(2));
        assert!(!response.answers(3));

        let notification: RpcMessage = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}"#,
        )
        .unwrap();
        assert!(!notification.answers(2));
    }

    #[test]
    fn joins_text_blocks_with_newlines() {
        let result = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image", "data": "AAAA"},
                {"type": "text", "text": "second"}
            ]
        });
        assert_eq!(render_call_result("qr", "t", &result).unwrap(), "first\nsecond");
    }

    #[test]
    fn falls_back_to_json_without_text() {
        let result = json!({"content": [], "structured": {"ok": true}});
        let text = render_call_result("qr", "t", &result).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), result);
    }

    #[test]
    fn is_error_becomes_tool_error() {
        let result = json!({"content": [{"type": "text", "text": "bad path"}], "isError": true});
        let err = render_call_result("qr", "read_qr", &result).expect_err("tool error");
        assert!(
            matches!(err, SessionError::Tool { ref tool, ref message, .. } if tool == "read_qr" && message == "bad path")
        );
    }

    #[test]
    fn decodes_tool_lists() {
        let tools = decode_tool_list(
            "git",
            json!({"tools": [{"name": "git_status", "description": "Shows status", "inputSchema": {}}]}),
        )
        .unwrap();
        assert_eq!(tools[0].name, "git_status");
        assert!(decode_tool_list("git", json!({"tools": 3})).is_err());
    }
}
