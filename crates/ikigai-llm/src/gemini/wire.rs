//! Builds the Gemini `generateContent`/`streamGenerateContent` request body
//! from the provider-neutral [`Request`] (spec §6 "Provider request JSON",
//! given only as a reference shape, not a full grammar — the field mapping
//! below is this crate's own choice, recorded in the grounding ledger).

use ikigai_types::{ContentBlock, Message, Request, Role, ThinkingLevel, ToolChoice};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiToolGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<GeminiToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
pub struct GeminiSystemInstruction {
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiToolGroup {
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub struct GeminiFunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiToolConfig {
    pub function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
pub struct GeminiFunctionCallingConfig {
    pub mode: &'static str,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<GeminiThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiThinkingConfig {
    pub thinking_budget: u32,
    pub include_thoughts: bool,
}

/// Token budget Gemini associates with each [`ThinkingLevel`]. Not specified
/// by the wire reference; chosen to span a reasonable low-to-high range.
fn thinking_budget(level: ThinkingLevel) -> u32 {
    match level {
        ThinkingLevel::None => 0,
        ThinkingLevel::Low => 1024,
        ThinkingLevel::Medium => 8192,
        ThinkingLevel::High => 24576,
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User | Role::Tool => "user",
        Role::Assistant => "model",
        Role::System => "user",
    }
}

fn content_block_to_part(block: &ContentBlock) -> Option<GeminiPart> {
    match block {
        ContentBlock::Text { text } => Some(GeminiPart {
            text: Some(text.clone()),
            ..Default::default()
        }),
        ContentBlock::Thinking { text, signature } => Some(GeminiPart {
            text: Some(text.clone()),
            thought: Some(true),
            thought_signature: signature.clone(),
            ..Default::default()
        }),
        ContentBlock::ToolCall {
            name,
            arguments,
            thought_signature,
            ..
        } => {
            let args = serde_json::from_str(arguments).unwrap_or(Value::Object(Default::default()));
            Some(GeminiPart {
                function_call: Some(GeminiFunctionCall {
                    name: name.clone(),
                    args,
                }),
                thought_signature: thought_signature.clone(),
                ..Default::default()
            })
        }
        ContentBlock::ToolResult { name, content, is_error, .. } => {
            let response = if *is_error {
                serde_json::json!({ "error": content })
            } else {
                serde_json::json!({ "output": content })
            };
            Some(GeminiPart {
                function_response: Some(GeminiFunctionResponse {
                    name: name.clone(),
                    response,
                }),
                ..Default::default()
            })
        }
    }
}

fn message_to_content(message: &Message) -> Option<GeminiContent> {
    if matches!(message.role, Role::System) {
        return None;
    }
    let parts: Vec<GeminiPart> = message.content.iter().filter_map(content_block_to_part).collect();
    if parts.is_empty() {
        return None;
    }
    Some(GeminiContent {
        role: role_str(message.role).to_string(),
        parts,
    })
}

pub fn to_gemini_request(request: &Request) -> GeminiRequest {
    let contents = request.messages.iter().filter_map(message_to_content).collect();

    let mut system_parts = Vec::new();
    if let Some(system_prompt) = &request.system_prompt {
        system_parts.push(GeminiPart {
            text: Some(system_prompt.clone()),
            ..Default::default()
        });
    }
    for message in &request.messages {
        if matches!(message.role, Role::System) {
            if let Some(text) = message.text() {
                system_parts.push(GeminiPart {
                    text: Some(text),
                    ..Default::default()
                });
            }
        }
    }
    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(GeminiSystemInstruction { parts: system_parts })
    };

    let tools = request.tools.as_ref().map(|defs| {
        vec![GeminiToolGroup {
            function_declarations: defs
                .iter()
                .map(|d| GeminiFunctionDeclaration {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    parameters: d.parameters.clone(),
                })
                .collect(),
        }]
    });

    let tool_config = request.tool_choice.map(|choice| GeminiToolConfig {
        function_calling_config: GeminiFunctionCallingConfig {
            mode: match choice {
                ToolChoice::Auto => "AUTO",
                ToolChoice::None => "NONE",
                ToolChoice::Required => "ANY",
            },
        },
    });

    let generation_config = if request.max_output_tokens.is_some() || request.thinking.is_some() {
        Some(GeminiGenerationConfig {
            max_output_tokens: request.max_output_tokens,
            thinking_config: request.thinking.as_ref().map(|t| GeminiThinkingConfig {
                thinking_budget: thinking_budget(t.level),
                include_thoughts: t.include_summary,
            }),
        })
    } else {
        None
    };

    GeminiRequest {
        contents,
        system_instruction,
        tools,
        tool_config,
        generation_config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ikigai_types::Message;

    #[test]
    fn system_prompt_and_system_messages_fold_into_system_instruction() {
        let mut request = Request::new("gemini-2.5-flash", vec![Message::user("hi")]);
        request = request.with_system_prompt("be terse");
        let wire = to_gemini_request(&request);
        assert_eq!(wire.system_instruction.unwrap().parts.len(), 1);
        assert_eq!(wire.contents.len(), 1);
        assert_eq!(wire.contents[0].role, "user");
    }

    #[test]
    fn assistant_tool_call_becomes_function_call_part() {
        let message = Message::assistant(vec![ContentBlock::tool_call(
            "id1",
            "grep",
            r#"{"pattern":"x"}"#,
        )]);
        let request = Request::new("gemini-2.5-flash", vec![message]);
        let wire = to_gemini_request(&request);
        assert_eq!(wire.contents[0].role, "model");
        assert!(wire.contents[0].parts[0].function_call.is_some());
    }

    #[test]
    fn tool_result_function_response_is_keyed_by_tool_name_not_call_id() {
        let message = Message::tool_result("a22-char-opaque-call-id", "grep", "match found", false);
        let request = Request::new("gemini-2.5-flash", vec![message]);
        let wire = to_gemini_request(&request);
        let response = wire.contents[0].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "grep");
    }
}
