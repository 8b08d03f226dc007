//! Uniform stream event emitted by any provider's stream adapter (spec §3, §4.3).

use crate::error::ErrorCategory;
use crate::response::{FinishReason, Usage};

/// One event from an in-flight streaming request.
///
/// `index` disambiguates interleaved content blocks within one stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start {
        model: String,
    },
    TextDelta {
        index: i64,
        text: String,
    },
    ThinkingDelta {
        index: i64,
        text: String,
    },
    ToolCallStart {
        index: i64,
        id: String,
        name: String,
    },
    ToolCallDelta {
        index: i64,
        args_json_fragment: String,
    },
    ToolCallDone {
        index: i64,
    },
    Done {
        finish_reason: FinishReason,
        usage: Usage,
        provider_data: Option<String>,
    },
    Error {
        category: ErrorCategory,
        message: String,
    },
}
