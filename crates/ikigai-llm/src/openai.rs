//! OpenAI-compatible chat-completions backend (spec.md §2 "Supplemental
//! features" — a second `Provider` family demonstrating the trait isn't
//! Gemini-specific). Non-streaming-only: `stream()` wraps one `complete()`
//! call and replays it as a single burst of [`StreamEvent`]s, since the
//! spec only fully specifies Gemini's SSE grammar. Grounded on
//! `arawn-llm::openai`'s `OpenAiBackend`/wire-format request and response
//! conversion.

use std::time::Duration;

use async_stream::stream as async_stream_ready;
use ikigai_types::{ContentBlock, FinishReason, Message, Request, Response, Role, StreamEvent, ToolChoice, Usage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{LlmError, Result};
use crate::provider::{with_cancellation, EventStream, Provider};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Config for a local OpenAI-compatible server (e.g. Ollama) that
    /// needs no API key.
    pub fn local(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::Config("OPENAI_API_KEY environment variable not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build().map_err(LlmError::Transport)?;
        Ok(Self { client, config })
    }

    fn to_wire_request(request: &Request) -> WireRequest {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        for message in &request.messages {
            messages.extend(to_wire_messages(message));
        }

        let tools = request.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|tool| WireTool {
                    tool_type: "function".to_string(),
                    function: WireFunction {
                        name: tool.name.clone(),
                        description: Some(tool.description.clone()),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect()
        });

        let tool_choice = request.tool_choice.map(|choice| match choice {
            ToolChoice::Auto => "auto".to_string(),
            ToolChoice::None => "none".to_string(),
            ToolChoice::Required => "required".to_string(),
        });

        WireRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_output_tokens,
            tools,
            tool_choice,
        }
    }
}

fn to_wire_messages(message: &Message) -> Vec<WireMessage> {
    let tool_calls: Vec<WireToolCall> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolCall { id, name, arguments, .. } => Some(WireToolCall {
                id: id.clone(),
                call_type: "function".to_string(),
                function: WireFunctionCall { name: name.clone(), arguments: arguments.clone() },
            }),
            _ => None,
        })
        .collect();

    let tool_results: Vec<(String, String)> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult { tool_call_id, content, .. } => Some((tool_call_id.clone(), content.clone())),
            _ => None,
        })
        .collect();

    if !tool_results.is_empty() {
        return tool_results
            .into_iter()
            .map(|(tool_call_id, content)| WireMessage {
                role: "tool".to_string(),
                content: Some(content),
                tool_calls: None,
                tool_call_id: Some(tool_call_id),
            })
            .collect();
    }

    let text = message.text();
    if !tool_calls.is_empty() {
        return vec![WireMessage {
            role: "assistant".to_string(),
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }];
    }

    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    vec![WireMessage { role: role.to_string(), content: Some(text), tool_calls: None, tool_call_id: None }]
}

fn from_wire_response(wire: WireChatResponse) -> Response {
    let model = wire.model;
    let Some(choice) = wire.choices.into_iter().next() else {
        return Response { model, finish_reason: FinishReason::Unknown, content: Vec::new(), usage: Usage::default(), provider_data: None };
    };

    let mut content = Vec::new();
    if let Some(text) = choice.message.content {
        if !text.is_empty() {
            content.push(ContentBlock::text(text));
        }
    }
    for tool_call in choice.message.tool_calls.unwrap_or_default() {
        content.push(ContentBlock::tool_call(tool_call.id, tool_call.function.name, tool_call.function.arguments));
    }

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolUse,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    };

    let usage = wire.usage.map(|u| Usage {
        input: u.prompt_tokens,
        output: u.completion_tokens,
        thinking: 0,
        cached: 0,
        total: u.total_tokens.unwrap_or(u.prompt_tokens + u.completion_tokens),
    }).unwrap_or_default();

    Response { model, finish_reason, content, usage, provider_data: Some(json_id(&wire.id)) }
}

fn json_id(id: &str) -> String {
    serde_json::json!({ "id": id }).to_string()
}

/// Owned-state request execution, so the future this builds does not
/// borrow `&self` — needed because `stream()` boxes it into a `'static`
/// [`EventStream`].
async fn complete_request(client: Client, config: OpenAiConfig, request: Request) -> Result<Response> {
    let wire = OpenAiProvider::to_wire_request(&request);
    let url = format!("{}/chat/completions", config.base_url);
    let mut builder = client.post(url).json(&wire);
    if let Some(key) = &config.api_key {
        builder = builder.bearer_auth(key);
    }
    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<WireErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
        return Err(LlmError::provider(ikigai_types::ErrorCategory::from_http_status(status.as_u16()), message));
    }

    let wire: WireChatResponse = response.json().await?;
    Ok(from_wire_response(wire))
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: Request) -> Result<Response> {
        complete_request(self.client.clone(), self.config.clone(), request).await
    }

    fn stream(&self, request: Request) -> (EventStream, CancellationToken) {
        let token = CancellationToken::new();
        let model = request.model.clone();
        let result = complete_request(self.client.clone(), self.config.clone(), request);

        let inner: EventStream = Box::pin(async_stream_ready! {
            yield StreamEvent::Start { model: model.clone() };
            match result.await {
                Ok(response) => {
                    for (index, block) in response.content.iter().enumerate() {
                        match block {
                            ContentBlock::Text { text } => {
                                yield StreamEvent::TextDelta { index: index as i64, text: text.clone() };
                            }
                            ContentBlock::Thinking { text, .. } => {
                                yield StreamEvent::ThinkingDelta { index: index as i64, text: text.clone() };
                            }
                            ContentBlock::ToolCall { id, name, arguments, .. } => {
                                let idx = index as i64;
                                yield StreamEvent::ToolCallStart { index: idx, id: id.clone(), name: name.clone() };
                                yield StreamEvent::ToolCallDelta { index: idx, args_json_fragment: arguments.clone() };
                                yield StreamEvent::ToolCallDone { index: idx };
                            }
                            ContentBlock::ToolResult { .. } => {}
                        }
                    }
                    yield StreamEvent::Done {
                        finish_reason: response.finish_reason,
                        usage: response.usage,
                        provider_data: response.provider_data,
                    };
                }
                Err(err) => {
                    yield StreamEvent::Error { category: err.category(), message: err.to_string() };
                }
            }
        });

        (with_cancellation(token.clone(), inner), token)
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    id: String,
    model: String,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ikigai_types::ToolDefinition;

    #[test]
    fn system_prompt_becomes_a_leading_system_message() {
        let request = Request::new("gpt-4o", vec![Message::user("hi")]).with_system_prompt("be nice");
        let wire = OpenAiProvider::to_wire_request(&request);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[0].content.as_deref(), Some("be nice"));
    }

    #[test]
    fn assistant_tool_call_becomes_tool_calls_field() {
        let message = Message::assistant(vec![ContentBlock::tool_call("id1", "grep", r#"{"pattern":"x"}"#)]);
        let request = Request::new("gpt-4o", vec![message]);
        let wire = OpenAiProvider::to_wire_request(&request);
        let tool_calls = wire.messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].function.name, "grep");
    }

    #[test]
    fn tool_result_becomes_a_tool_role_message() {
        let message = Message::tool_result("id1", "grep", "output text", false);
        let request = Request::new("gpt-4o", vec![message]);
        let wire = OpenAiProvider::to_wire_request(&request);
        assert_eq!(wire.messages[0].role, "tool");
        assert_eq!(wire.messages[0].tool_call_id.as_deref(), Some("id1"));
    }

    #[test]
    fn tools_are_wrapped_as_function_type() {
        let request = Request::new("gpt-4o", vec![Message::user("hi")]).with_tools(vec![ToolDefinition {
            name: "grep".to_string(),
            description: "search".to_string(),
            parameters: serde_json::json!({}),
            strict: false,
        }]);
        let wire = OpenAiProvider::to_wire_request(&request);
        assert_eq!(wire.tools.unwrap()[0].tool_type, "function");
    }

    #[test]
    fn response_maps_tool_calls_finish_reason_and_usage() {
        let body = serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "message": { "content": null, "tool_calls": [{
                    "id": "call_1", "type": "function",
                    "function": { "name": "grep", "arguments": "{\"pattern\":\"x\"}" }
                }] },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        let wire: WireChatResponse = serde_json::from_value(body).unwrap();
        let response = from_wire_response(wire);
        assert_eq!(response.finish_reason, FinishReason::ToolUse);
        assert_eq!(response.usage.total, 15);
        match &response.content[0] {
            ContentBlock::ToolCall { name, .. } => assert_eq!(name, "grep"),
            other => panic!("unexpected block: {other:?}"),
        }
    }
}
