//! Shared error taxonomy (spec §3, §7).

use serde::{Deserialize, Serialize};

/// The category every failure in the core is classified into.
///
/// `OutOfMemory` is fatal — callers are not expected to handle it, the
/// process panics instead. Every other category is propagated as a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidArg,
    Auth,
    NotFound,
    RateLimit,
    Server,
    Timeout,
    Network,
    Parse,
    Provider,
    OutOfMemory,
    Unknown,
}

impl ErrorCategory {
    /// Map a provider `status` string (Gemini's `error.status`) to a category.
    pub fn from_provider_status(status: Option<&str>) -> Self {
        match status {
            Some("UNAUTHENTICATED") => Self::Auth,
            Some("RESOURCE_EXHAUSTED") => Self::RateLimit,
            Some("INVALID_ARGUMENT") => Self::InvalidArg,
            _ => Self::Unknown,
        }
    }

    /// Map an HTTP status code (non-streaming path) to a category.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidArg,
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            429 => Self::RateLimit,
            500 | 502 | 503 => Self::Server,
            504 => Self::Timeout,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidArg => "invalid_arg",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::RateLimit => "rate_limit",
            Self::Server => "server",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Parse => "parse",
            Self::Provider => "provider",
            Self::OutOfMemory => "out_of_memory",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
