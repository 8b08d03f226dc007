//! Persistence side-effect boundary (spec §6 "Database sink").
//!
//! `ikigai-agent` depends only on this trait; `ikigai-session` supplies the
//! `rusqlite`-backed implementation so the agent crate stays free of a
//! concrete storage dependency, matching the layering between
//! `arawn-agent` and `arawn-workstream::store::WorkstreamStore`.

use async_trait::async_trait;

use crate::error::Result;

/// Row kinds a `DbSink` accepts (spec §6).
pub const KIND_USER: &str = "user";
pub const KIND_ASSISTANT: &str = "assistant";
pub const KIND_TOOL: &str = "tool";
pub const KIND_INTERRUPTED: &str = "interrupted";
pub const KIND_COMMAND: &str = "command";

#[async_trait]
pub trait DbSink: Send + Sync {
    /// `insert_message(db, session_id, agent_uuid, kind, content, data_json)`
    /// (spec §6). `data_json` is a JSON string, or `None` for rows that
    /// carry no structured metadata.
    async fn insert_message(
        &self,
        session_id: &str,
        agent_uuid: &str,
        kind: &str,
        content: &str,
        data_json: Option<&str>,
    ) -> Result<()>;
}
