//! Debug output pipes (spec §4.6 step 6), grounded on
//! `original_source/src/debug_pipe.h`: each subsystem that wants to surface
//! diagnostic output gets a named, prefixed line source the event loop
//! drains every iteration. Lines are always drained to keep the writer end
//! from blocking; whether they reach scrollback depends on `debug_enabled`.
//!
//! The original models this over raw pipe fds reaped by `select()`. Here a
//! pipe source is anything line-buffered and `AsyncRead`— a tool
//! subprocess's stderr, most commonly — multiplexed the same way the event
//! loop already multiplexes per-agent provider streams.

use std::pin::Pin;

use futures::stream::SelectAll;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// One line read from a debug pipe, tagged with its source's prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLine {
    pub prefix: String,
    pub text: String,
}

type LineStream = Pin<Box<dyn Stream<Item = DebugLine> + Send>>;

/// Drains any number of named line sources, gated by a runtime-toggleable
/// `debug_enabled` flag (spec: "/debug command without blocking writers").
pub struct DebugManager {
    lines: SelectAll<LineStream>,
    enabled: bool,
}

impl DebugManager {
    pub fn new() -> Self {
        Self { lines: SelectAll::new(), enabled: false }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Registers a new source; `prefix` (e.g. `"[tool]"`) is prepended to
    /// every line read from it.
    pub fn add_pipe<R>(&mut self, prefix: impl Into<String>, reader: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let prefix = prefix.into();
        let lines = BufReader::new(reader).lines();
        let stream = futures::stream::unfold(lines, move |mut lines| {
            let prefix = prefix.clone();
            async move {
                match lines.next_line().await {
                    Ok(Some(text)) => Some((DebugLine { prefix, text }, lines)),
                    _ => None,
                }
            }
        });
        self.lines.push(Box::pin(stream));
    }

    /// Polls for the next ready line across all registered pipes. Returns
    /// `None` only when every registered pipe's writer has closed.
    pub async fn next_line(&mut self) -> Option<DebugLine> {
        self.lines.next().await
    }
}

impl Default for DebugManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_are_prefixed_by_source() {
        let mut mgr = DebugManager::new();
        mgr.add_pipe("[curl]", std::io::Cursor::new(b"connecting\nconnected\n".to_vec()));

        let first = mgr.next_line().await.unwrap();
        assert_eq!(first.prefix, "[curl]");
        assert_eq!(first.text, "connecting");

        let second = mgr.next_line().await.unwrap();
        assert_eq!(second.text, "connected");
    }

    #[tokio::test]
    async fn exhausted_pipe_yields_no_more_lines() {
        let mut mgr = DebugManager::new();
        mgr.add_pipe("[x]", std::io::Cursor::new(b"only\n".to_vec()));
        assert!(mgr.next_line().await.is_some());
        assert!(mgr.next_line().await.is_none());
    }

    #[tokio::test]
    async fn multiple_pipes_interleave_without_blocking_each_other() {
        let mut mgr = DebugManager::new();
        mgr.add_pipe("[a]", std::io::Cursor::new(b"a1\na2\n".to_vec()));
        mgr.add_pipe("[b]", std::io::Cursor::new(b"b1\n".to_vec()));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mgr.next_line().await.unwrap().text);
        }
        seen.sort();
        assert_eq!(seen, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn disabled_by_default() {
        assert!(!DebugManager::new().enabled());
    }
}
