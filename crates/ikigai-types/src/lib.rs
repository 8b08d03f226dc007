//! Shared data model for the Ikigai agent core.
//!
//! This crate has no I/O of its own — it is the vocabulary every other
//! crate (`ikigai-llm`, `ikigai-agent`, `ikigai-session`, `ikigai-tui`)
//! shares: messages, requests/responses, stream events, agent state, and
//! the bounded scrollback buffer.

pub mod agent_state;
pub mod error;
pub mod message;
pub mod request;
pub mod response;
pub mod scrollback;
pub mod stream_event;
pub mod tool_call;

pub use agent_state::AgentState;
pub use error::ErrorCategory;
pub use message::{ContentBlock, Message, Role};
pub use request::{Request, ThinkingConfig, ThinkingLevel, ToolChoice, ToolDefinition};
pub use response::{FinishReason, Response, Usage};
pub use scrollback::{ScrollLine, Scrollback};
pub use stream_event::StreamEvent;
pub use tool_call::ToolCall;
