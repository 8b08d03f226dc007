//! `rusqlite`-backed [`DbSink`] (spec §6 "Database sink").
//!
//! Grounded on `arawn-workstream::store::WorkstreamStore`: a thin
//! repository wrapping `Mutex<Connection>`, migrated with `refinery` at
//! open time. One table holds every persisted row kind the core core
//! emits (`user`/`assistant`/`tool`/`interrupted`/`command`).

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use ikigai_agent::{AgentError, DbSink};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use serde_json::json;

use crate::error::{Result, SessionError};

/// A slash-command invocation, persisted as a `"command"` kind row
/// (spec §6 "CLI surface"). The CLI surface itself is out of core scope;
/// this is just the convenience the core's persistence layer exposes for it.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub name: String,
    pub args: String,
    pub output: String,
}

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Thread-safe, blocking-call repository over SQLite.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::migrated(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::migrated(conn)
    }

    fn migrated(mut conn: Connection) -> Result<Self> {
        let report = embedded::migrations::runner()
            .run(&mut conn)
            .map_err(|e| SessionError::Migration(e.to_string()))?;
        tracing::debug!(applied = report.applied_migrations().len(), "ran session migrations");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn insert(
        &self,
        session_id: &str,
        agent_uuid: &str,
        kind: &str,
        content: &str,
        data_json: Option<&str>,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (session_id, agent_id, kind, content, data_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![session_id, agent_uuid, kind, content, data_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn conn(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// `content = "/name args\n<command output>"`, `data_json =
    /// {"command":"name","args":"…"}"` (spec §6 "CLI surface").
    pub fn insert_command(&self, session_id: &str, agent_uuid: &str, record: &CommandRecord) -> Result<()> {
        let content = format!("/{} {}\n{}", record.name, record.args, record.output);
        let data = json!({"command": record.name, "args": record.args}).to_string();
        self.insert(session_id, agent_uuid, "command", &content, Some(&data))
    }
}

#[async_trait]
impl DbSink for SqliteSink {
    async fn insert_message(
        &self,
        session_id: &str,
        agent_uuid: &str,
        kind: &str,
        content: &str,
        data_json: Option<&str>,
    ) -> ikigai_agent::Result<()> {
        self.insert(session_id, agent_uuid, kind, content, data_json)
            .map_err(|e| AgentError::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_count_rows() {
        let sink = SqliteSink::open_in_memory().unwrap();
        sink.insert_message("s1", "a1", "user", "hello", None).await.unwrap();
        sink.insert_message("s1", "a1", "assistant", "hi", Some(r#"{"model":"x"}"#))
            .await
            .unwrap();

        let count: i64 = sink
            .conn()
            .query_row("SELECT COUNT(*) FROM messages WHERE session_id = 's1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn known_kinds_round_trip() {
        let sink = SqliteSink::open_in_memory().unwrap();
        for kind in [
            ikigai_agent::sink::KIND_USER,
            ikigai_agent::sink::KIND_ASSISTANT,
            ikigai_agent::sink::KIND_TOOL,
            ikigai_agent::sink::KIND_INTERRUPTED,
            ikigai_agent::sink::KIND_COMMAND,
        ] {
            sink.insert_message("s1", "a1", kind, "x", None).await.unwrap();
        }
    }

    #[test]
    fn insert_command_formats_content_and_data() {
        let sink = SqliteSink::open_in_memory().unwrap();
        let record = CommandRecord {
            name: "clear".to_string(),
            args: String::new(),
            output: "scrollback cleared".to_string(),
        };
        sink.insert_command("s1", "a1", &record).unwrap();

        let content: String = sink
            .conn()
            .query_row("SELECT content FROM messages WHERE kind = 'command'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(content, "/clear \nscrollback cleared");
    }
}
