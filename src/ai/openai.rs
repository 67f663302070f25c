//! OpenAI API integration.
//!
//! Implements the ChatModel trait against any OpenAI-compatible
//! `chat/completions` endpoint.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{AIError, ChatMessage, ChatModel, ChatRequest, ModelReply, ModelToolCall};
use crate::core::HostConfig;

/// OpenAI API provider.
pub struct OpenAIProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AIError> {
        let client = reqwest::blocking::Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Create from host settings. The API key must be present.
    pub fn from_config(host: &HostConfig) -> Result<Self, AIError> {
        let api_key = host.api_key.clone().filter(|k| !k.is_empty()).ok_or(AIError::MissingApiKey)?;
        Ok(Self::new(api_key)?.with_model(&host.model).with_base_url(&host.base_url))
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Create with a custom base URL (for compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for a completion.
    fn request_body(&self, request: &ChatRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages.iter().map(wire_message).collect::<Vec<_>>(),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if let Some(tools) = request.tools.filter(|t| !t.is_empty()) {
            body["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {"name": t.name, "description": t.description, "parameters": t.parameters}
                    })
                })
                .collect();
            body["tool_choice"] = json!("auto");
        }

        body
    }
}

impl ChatModel for OpenAIProvider {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<ModelReply, AIError> {
        let body = self.request_body(request);
        tracing::debug!(model = %self.model, messages = request.messages.len(), "Requesting completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AIError::Api { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse =
            response.json().map_err(|e| AIError::InvalidResponse(e.to_string()))?;
        parse_reply(parsed)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Message in the OpenAI wire shape.
fn wire_message(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System { content } => json!({"role": "system", "content": content}),
        ChatMessage::User { content } => json!({"role": "user", "content": content}),
        ChatMessage::Assistant { content, tool_calls } => {
            let mut value = json!({"role": "assistant", "content": content.clone().unwrap_or_default()});
            if !tool_calls.is_empty() {
                value["tool_calls"] = tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.arguments}
                        })
                    })
                    .collect();
            }
            value
        }
        ChatMessage::Tool { tool_call_id, content } => {
            json!({"role": "tool", "tool_call_id": tool_call_id, "content": content})
        }
    }
}

fn parse_reply(response: CompletionResponse) -> Result<ModelReply, AIError> {
    let choice = response.choices.into_iter().next().ok_or(AIError::NoResponse)?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| ModelToolCall {
            id: call.id.filter(|id| !id.is_empty()).unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: call.function.name,
            arguments: call.function.arguments.filter(|a| !a.trim().is_empty()).unwrap_or_else(|| "{}".to_string()),
        })
        .collect();

    Ok(ModelReply { content: choice.message.content, tool_calls })
}

// Response types

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}
