//! Per-agent state enum (spec §3, §4.4).

use serde::{Deserialize, Serialize};

/// The three states an [`Agent`](crate::) can be in.
///
/// Exactly one holds at all times (spec §8 universal invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    WaitingForLlm,
    ExecutingTool,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Idle
    }
}

impl AgentState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_waiting_for_llm(&self) -> bool {
        matches!(self, Self::WaitingForLlm)
    }

    pub fn is_executing_tool(&self) -> bool {
        matches!(self, Self::ExecutingTool)
    }
}
