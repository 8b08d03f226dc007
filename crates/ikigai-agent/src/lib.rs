//! Agent state machine and subprocess tool executor (spec §4.4, §4.5).

pub mod agent;
pub mod error;
pub mod sink;
pub mod tool_exec;
pub mod tool_registry;
pub mod types;

pub use agent::{Agent, AgentContext, ResponseMeta};
pub use error::{AgentError, Result};
pub use sink::DbSink;
pub use tool_exec::{ToolHandle, ToolWorkerState};
pub use tool_registry::{ToolRegistry, ToolSpec};
pub use types::AgentConfig;
