//! Agent configuration (spec §4.4, §4.5, §9 Open Question #2).

use std::time::Duration;

/// Runtime configuration shared by every agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on consecutive tool-call round trips in one turn before
    /// the agent gives up and surfaces [`crate::error::AgentError::MaxIterations`].
    pub max_tool_iterations: u32,
    /// How long the interrupt path waits after SIGTERM before escalating to
    /// SIGKILL (spec §5 "Timeouts": "SIGTERM→SIGKILL within ≤200 ms").
    pub sigterm_grace: Duration,
    /// Maximum number of lines retained in an agent's scrollback.
    pub scrollback_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 25,
            sigterm_grace: Duration::from_millis(200),
            scrollback_capacity: 10_000,
        }
    }
}
