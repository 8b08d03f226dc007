//! Non-streaming Gemini response parsing (spec §4.3, the `generateContent`
//! counterpart to `stream.rs`'s `streamGenerateContent` parser). Shares the
//! finish-reason table and tool-id generation with the streaming path but
//! parses one complete JSON document rather than folding over chunks.

use ikigai_types::{ContentBlock, ErrorCategory, FinishReason, Usage};
use serde_json::Value;

use super::ids::generate_tool_call_id;
use crate::error::{LlmError, Result};

pub fn parse_response(body: &Value) -> Result<ikigai_types::Response> {
    let Some(obj) = body.as_object() else {
        return Err(LlmError::provider(ErrorCategory::Parse, "root is not an object"));
    };

    if let Some(error_obj) = obj.get("error") {
        let message = error_obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        let status = error_obj.get("status").and_then(Value::as_str);
        let category = ErrorCategory::from_provider_status(status);
        return Err(LlmError::provider(category, format!("API error: {message}")));
    }

    if let Some(reason) = obj
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(Value::as_str)
    {
        return Err(LlmError::provider(
            ErrorCategory::Provider,
            format!("prompt blocked: {reason}"),
        ));
    }

    let model = obj
        .get("modelVersion")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let usage = obj.get("usageMetadata").map(parse_usage).unwrap_or_default();

    let candidate = obj
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first());

    let Some(candidate) = candidate else {
        return Ok(ikigai_types::Response {
            model,
            finish_reason: FinishReason::Unknown,
            content: Vec::new(),
            usage,
            provider_data: None,
        });
    };

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .map(FinishReason::from_gemini)
        .unwrap_or(FinishReason::Unknown);

    let mut content = Vec::new();
    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
    {
        for part in parts {
            content.push(parse_part(part)?);
        }
    }

    Ok(ikigai_types::Response {
        model,
        finish_reason,
        content,
        usage,
        provider_data: None,
    })
}

fn parse_part(part: &Value) -> Result<ContentBlock> {
    if let Some(function_call) = part.get("functionCall") {
        let name = function_call
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::provider(ErrorCategory::Parse, "functionCall missing 'name' field"))?
            .to_string();
        let arguments = function_call
            .get("args")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "{}".to_string());
        let thought_signature = part
            .get("thoughtSignature")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(ContentBlock::ToolCall {
            id: generate_tool_call_id(),
            name,
            arguments,
            thought_signature,
        });
    }

    let thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
    let text = part.get("text").and_then(Value::as_str).unwrap_or("").to_string();

    if thought {
        Ok(ContentBlock::Thinking { text, signature: None })
    } else {
        Ok(ContentBlock::Text { text })
    }
}

fn parse_usage(usage_obj: &Value) -> Usage {
    let prompt = usage_obj.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0);
    let candidates = usage_obj.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(0);
    let thoughts = usage_obj.get("thoughtsTokenCount").and_then(Value::as_u64).unwrap_or(0);
    let total = usage_obj.get("totalTokenCount").and_then(Value::as_u64).unwrap_or(0);

    Usage {
        input: prompt,
        output: candidates.saturating_sub(thoughts),
        thinking: thoughts,
        cached: 0,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_response() {
        let body = json!({
            "modelVersion": "gemini-2.5-flash",
            "candidates": [{
                "finishReason": "STOP",
                "content": {"parts": [{"text": "hello"}]}
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 1, "totalTokenCount": 5}
        });
        let response = parse_response(&body).unwrap();
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.content.len(), 1);
        assert_eq!(response.content[0].as_text(), Some("hello"));
    }

    #[test]
    fn tool_call_keeps_reported_finish_reason() {
        let body = json!({
            "modelVersion": "gemini-2.5-flash",
            "candidates": [{
                "finishReason": "STOP",
                "content": {"parts": [{"functionCall": {"name": "grep", "args": {"pattern": "x"}}}]}
            }]
        });
        let response = parse_response(&body).unwrap();
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert!(matches!(response.content[0], ContentBlock::ToolCall { .. }));
    }

    #[test]
    fn missing_args_defaults_to_empty_object() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"functionCall": {"name": "noop"}}]}}]
        });
        let response = parse_response(&body).unwrap();
        match &response.content[0] {
            ContentBlock::ToolCall { arguments, .. } => assert_eq!(arguments, "{}"),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn error_object_maps_category_from_status() {
        let body = json!({"error": {"message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}});
        let err = parse_response(&body).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RateLimit);
    }

    #[test]
    fn blocked_prompt_is_a_provider_error() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = parse_response(&body).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Provider);
    }

    #[test]
    fn missing_candidates_returns_empty_response() {
        let body = json!({"modelVersion": "m"});
        let response = parse_response(&body).unwrap();
        assert!(response.content.is_empty());
        assert_eq!(response.finish_reason, FinishReason::Unknown);
    }
}
