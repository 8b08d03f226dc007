//! Incremental SSE chunk processing for the Gemini streaming endpoint
//! (spec §4.3 "Lifecycle" / "Per-chunk processing").
//!
//! One [`StreamContext`] is created per request and fed every chunk in
//! order via [`StreamContext::process_chunk`]; it yields the
//! [`StreamEvent`]s that chunk produces. After the stream ends,
//! [`StreamContext::into_response`] reconstructs the non-streaming
//! [`Response`] shape the agent loop persists, including Google's
//! STOP-even-for-tool-calls quirk.

use ikigai_types::{ContentBlock, ErrorCategory, FinishReason, Response, StreamEvent, Usage};
use serde_json::Value;

use super::ids::generate_tool_call_id;

#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_accum: String,
    thought_signature: Option<String>,
}

/// Accumulates state across one Gemini stream and turns raw SSE `data:`
/// payloads into [`StreamEvent`]s.
#[derive(Debug)]
pub struct StreamContext {
    model: Option<String>,
    finish_reason: FinishReason,
    usage: Usage,
    started: bool,
    in_thinking: bool,
    in_tool_call: bool,
    current_tool: Option<PendingToolCall>,
    part_index: i64,
}

impl StreamContext {
    pub fn new() -> Self {
        Self {
            model: None,
            finish_reason: FinishReason::Unknown,
            usage: Usage::default(),
            started: false,
            in_thinking: false,
            in_tool_call: false,
            current_tool: None,
            part_index: 0,
        }
    }

    /// Process one SSE `data:` payload. Malformed JSON and non-object
    /// payloads are silently ignored, matching the original parser.
    pub fn process_chunk(&mut self, data: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if data.trim().is_empty() {
            return events;
        }
        let root: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => return events,
        };
        let Some(obj) = root.as_object() else {
            return events;
        };

        if let Some(error_obj) = obj.get("error") {
            let message = error_obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            let status = error_obj.get("status").and_then(Value::as_str);
            let category = ErrorCategory::from_provider_status(status);
            events.push(StreamEvent::Error { category, message });
            return events;
        }

        if !self.started {
            if let Some(model) = obj.get("modelVersion").and_then(Value::as_str) {
                self.model = Some(model.to_string());
            }
            events.push(StreamEvent::Start {
                model: self.model.clone().unwrap_or_default(),
            });
            self.started = true;
        }

        if let Some(candidate) = obj
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
        {
            if let Some(finish_str) = candidate.get("finishReason").and_then(Value::as_str) {
                self.finish_reason = FinishReason::from_gemini(finish_str);
            }
            if let Some(parts) = candidate
                .get("content")
                .and_then(|c| c.get("parts"))
                .and_then(Value::as_array)
            {
                for part in parts {
                    self.process_part(part, &mut events);
                }
            }
        }

        if let Some(usage_obj) = obj.get("usageMetadata") {
            self.apply_usage(usage_obj);
            self.end_tool_call_if_needed(&mut events);
            events.push(StreamEvent::Done {
                finish_reason: self.finish_reason,
                usage: self.usage.clone(),
                provider_data: None,
            });
        }

        events
    }

    fn process_part(&mut self, part: &Value, events: &mut Vec<StreamEvent>) {
        if let Some(function_call) = part.get("functionCall") {
            self.process_function_call(function_call, events);
            return;
        }

        let thought = part
            .get("thought")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let text = match part.get("text").and_then(Value::as_str) {
            Some(t) if !t.is_empty() => t,
            _ => return,
        };

        self.end_tool_call_if_needed(events);

        if thought {
            self.in_thinking = true;
            events.push(StreamEvent::ThinkingDelta {
                index: self.part_index,
                text: text.to_string(),
            });
        } else {
            if self.in_thinking {
                self.part_index += 1;
                self.in_thinking = false;
            }
            events.push(StreamEvent::TextDelta {
                index: self.part_index,
                text: text.to_string(),
            });
        }
    }

    fn process_function_call(&mut self, function_call: &Value, events: &mut Vec<StreamEvent>) {
        if !self.in_tool_call {
            let id = generate_tool_call_id();
            let name = function_call
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            events.push(StreamEvent::ToolCallStart {
                index: self.part_index,
                id: id.clone(),
                name: name.clone(),
            });
            self.current_tool = Some(PendingToolCall {
                id,
                name,
                args_accum: String::new(),
                thought_signature: None,
            });
            self.in_tool_call = true;
        }

        if let Some(args) = function_call.get("args") {
            let fragment = args.to_string();
            if let Some(tool) = self.current_tool.as_mut() {
                tool.args_accum.push_str(&fragment);
            }
            events.push(StreamEvent::ToolCallDelta {
                index: self.part_index,
                args_json_fragment: fragment,
            });
        }
    }

    fn end_tool_call_if_needed(&mut self, events: &mut Vec<StreamEvent>) {
        if self.in_tool_call {
            events.push(StreamEvent::ToolCallDone {
                index: self.part_index,
            });
            self.in_tool_call = false;
        }
    }

    fn apply_usage(&mut self, usage_obj: &Value) {
        let prompt = usage_obj
            .get("promptTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let candidates = usage_obj
            .get("candidatesTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let thoughts = usage_obj
            .get("thoughtsTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let total = usage_obj
            .get("totalTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        self.usage = Usage {
            input: prompt,
            output: candidates.saturating_sub(thoughts),
            thinking: thoughts,
            cached: 0,
            total,
        };
    }

    /// Reconstruct the final [`Response`], overriding `finish_reason` to
    /// `ToolUse` when a tool call was seen (Gemini reports `STOP` even
    /// when the turn ends in a function call).
    pub fn into_response(self) -> Response {
        let model = self.model.unwrap_or_default();
        let mut finish_reason = self.finish_reason;
        let mut content = Vec::new();

        if let Some(tool) = self.current_tool {
            finish_reason = FinishReason::ToolUse;
            let arguments = if tool.args_accum.is_empty() {
                "{}".to_string()
            } else {
                tool.args_accum
            };
            content.push(ContentBlock::ToolCall {
                id: tool.id,
                name: tool.name,
                arguments,
                thought_signature: tool.thought_signature,
            });
        }

        Response {
            model,
            finish_reason,
            content,
            usage: self.usage,
            provider_data: None,
        }
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_stream_emits_start_delta_done() {
        let mut ctx = StreamContext::new();
        let mut events = ctx.process_chunk(
            r#"{"modelVersion":"gemini-2.5-flash","candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#,
        );
        events.extend(ctx.process_chunk(
            r#"{"usageMetadata":{"promptTokenCount":10,"candidatesTokenCount":2,"totalTokenCount":12}}"#,
        ));
        assert_eq!(
            events,
            vec![
                StreamEvent::Start { model: "gemini-2.5-flash".to_string() },
                StreamEvent::TextDelta { index: 0, text: "Hi".to_string() },
                StreamEvent::Done {
                    finish_reason: FinishReason::Unknown,
                    usage: Usage { input: 10, output: 2, thinking: 0, cached: 0, total: 12 },
                    provider_data: None,
                },
            ]
        );
    }

    #[test]
    fn thinking_then_text_increments_part_index() {
        let mut ctx = StreamContext::new();
        let mut events = ctx.process_chunk(
            r#"{"modelVersion":"m","candidates":[{"content":{"parts":[{"text":"let me think","thought":true}]}}]}"#,
        );
        events.extend(ctx.process_chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"answer"}]}}]}"#,
        ));
        assert_eq!(
            events[1],
            StreamEvent::ThinkingDelta { index: 0, text: "let me think".to_string() }
        );
        assert_eq!(
            events[2],
            StreamEvent::TextDelta { index: 1, text: "answer".to_string() }
        );
    }

    #[test]
    fn tool_call_closes_before_usage_and_overrides_finish_reason() {
        let mut ctx = StreamContext::new();
        ctx.process_chunk(r#"{"modelVersion":"m"}"#);
        let events = ctx.process_chunk(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"grep","args":{"pattern":"foo"}}}]}}]}"#,
        );
        assert!(matches!(events[0], StreamEvent::ToolCallStart { .. }));
        assert!(matches!(events[1], StreamEvent::ToolCallDelta { .. }));

        let done_events = ctx.process_chunk(
            r#"{"usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":3,"totalTokenCount":8}}"#,
        );
        assert!(matches!(done_events[0], StreamEvent::ToolCallDone { index: 0 }));

        let response = ctx.into_response();
        assert_eq!(response.finish_reason, FinishReason::ToolUse);
        assert_eq!(response.content.len(), 1);
    }

    #[test]
    fn empty_text_parts_are_skipped() {
        let mut ctx = StreamContext::new();
        let events = ctx.process_chunk(
            r#"{"modelVersion":"m","candidates":[{"content":{"parts":[{"text":""},{"thought":true}]}}]}"#,
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Start { .. }));
    }

    #[test]
    fn error_chunk_emits_error_only_and_does_not_mark_started() {
        let mut ctx = StreamContext::new();
        let events = ctx.process_chunk(
            r#"{"error":{"message":"bad key","status":"UNAUTHENTICATED"}}"#,
        );
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                category: ErrorCategory::Auth,
                message: "bad key".to_string(),
            }]
        );
        assert!(!ctx.started);
    }

    #[test]
    fn candidate_without_content_emits_only_start() {
        let mut ctx = StreamContext::new();
        let events = ctx.process_chunk(r#"{"modelVersion":"m","candidates":[{}]}"#);
        assert_eq!(events.len(), 1);
    }
}
