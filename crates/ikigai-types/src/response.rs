//! Completed-response shape and usage accounting (spec §3).

use serde::{Deserialize, Serialize};

use crate::message::ContentBlock;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
    ToolUse,
    Unknown,
}

impl FinishReason {
    /// Gemini `finishReason` string → enum (spec §4.3).
    pub fn from_gemini(value: &str) -> Self {
        match value {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::Length,
            "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT" | "RECITATION" => Self::ContentFilter,
            "MALFORMED_FUNCTION_CALL" | "UNEXPECTED_TOOL_CALL" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Lowercase string for database persistence (spec §4.4 "Usage recording").
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
            Self::Error => "error",
            Self::ToolUse => "tool_use",
            Self::Unknown => "unknown",
        }
    }

    /// Round-trip partner of [`Self::as_db_str`].
    pub fn from_db_str(value: &str) -> Self {
        match value {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "error" => Self::Error,
            "tool_use" => Self::ToolUse,
            _ => Self::Unknown,
        }
    }
}

/// Token accounting for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub thinking: u64,
    pub cached: u64,
    pub total: u64,
}

/// A completed (non-streaming, or stream-assembled) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub model: String,
    pub finish_reason: FinishReason,
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_data: Option<String>,
}
