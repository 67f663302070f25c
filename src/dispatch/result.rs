//! Normalized tool results.

use serde_json::{json, Value};

use crate::mcp::JsonRpcResponse;

/// Outcome of one tool call, whatever produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Whether the call failed
    pub is_error: bool,
    /// `structuredContent.result`, when the server sent one
    pub structured_payload: Option<Value>,
    /// Every `type: "text"` content entry, in order
    pub text_segments: Vec<String>,
    /// The untouched result object
    pub raw: Value,
}

impl ToolResult {
    /// Interpret a `tools/call` response envelope.
    ///
    /// A JSON-RPC error or a missing `result` becomes an error result.
    pub fn from_response(response: JsonRpcResponse) -> Self {
        if let Some(error) = response.error {
            let mut result = Self::failure(format!("MCP error {}", error));
            if let Some(data) = error.data {
                result.raw["data"] = data;
            }
            return result;
        }

        match response.result {
            Some(result) => Self::from_result_value(result),
            None => Self::failure("Server response carried no result"),
        }
    }

    /// Interpret a bare `tools/call` result object.
    pub fn from_result_value(raw: Value) -> Self {
        let is_error = raw.get("isError").and_then(Value::as_bool).unwrap_or(false);

        let structured_payload =
            raw.get("structuredContent").and_then(|content| content.get("result")).cloned();

        let text_segments = raw
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                    .map(|item| item.get("text").and_then(Value::as_str).unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();

        Self { is_error, structured_payload, text_segments, raw }
    }

    /// A locally built error result.
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            is_error: true,
            structured_payload: None,
            raw: json!({"content": [{"type": "text", "text": message}], "isError": true}),
            text_segments: vec![message],
        }
    }

    /// First text segment, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.text_segments.first().map(String::as_str)
    }
}
