//! Error types for the agent crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] ikigai_llm::LlmError),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid tool parameters: {0}")]
    InvalidToolParams(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("maximum tool iterations exceeded: {0}")]
    MaxIterations(u32),
}

impl AgentError {
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The [`ikigai_types::ErrorCategory`] this error maps to, for
    /// persistence and display (spec §7).
    pub fn category(&self) -> ikigai_types::ErrorCategory {
        use ikigai_types::ErrorCategory;
        match self {
            Self::Llm(e) => e.category(),
            Self::Tool(_) | Self::ToolNotFound(_) | Self::InvalidToolParams(_) => {
                ErrorCategory::InvalidArg
            }
            Self::Config(_) => ErrorCategory::InvalidArg,
            Self::Serialization(_) => ErrorCategory::Parse,
            Self::Io(_) => ErrorCategory::Network,
            Self::Internal(_) => ErrorCategory::Unknown,
            Self::MaxIterations(_) => ErrorCategory::Unknown,
        }
    }
}
