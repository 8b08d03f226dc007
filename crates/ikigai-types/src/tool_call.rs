//! In-flight tool call bookkeeping (spec §3).

/// A tool call accumulated from stream events, owned by the agent from
/// the first `ToolCallStart` until the matching tool-result message is
/// appended.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON arguments, accumulated incrementally across `ToolCallDelta` events.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: String::new(),
        }
    }

    pub fn append_arguments(&mut self, fragment: &str) {
        self.arguments.push_str(fragment);
    }

    /// The arguments as written, or `"{}"` if nothing was ever accumulated.
    pub fn arguments_or_empty_object(&self) -> &str {
        if self.arguments.is_empty() {
            "{}"
        } else {
            &self.arguments
        }
    }
}
