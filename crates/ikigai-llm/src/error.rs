//! Error type for the LLM crate.

use ikigai_types::ErrorCategory;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

/// Error surfaced by a provider backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{category}: {message}")]
    Provider {
        category: ErrorCategory,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    pub fn provider(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::Provider {
            category,
            message: message.into(),
        }
    }

    /// The [`ErrorCategory`] this error should be classified under, for
    /// database persistence and user display (spec §7).
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Provider { category, .. } => *category,
            Self::Transport(e) if e.is_timeout() => ErrorCategory::Timeout,
            Self::Transport(_) => ErrorCategory::Network,
            Self::Serialization(_) => ErrorCategory::Parse,
            Self::Config(_) => ErrorCategory::InvalidArg,
        }
    }
}
