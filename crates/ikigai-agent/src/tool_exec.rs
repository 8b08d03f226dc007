//! Subprocess tool execution (spec §4.5 "Tool execution", C5).
//!
//! The child is placed in its own process group so a single kill-to-group
//! terminates a tool that forked helpers. The worker communicates back
//! through a shared, mutex-guarded block matching the shape named in
//! spec §4.5: `{running, complete, result, result_is_error}`.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::{AgentError, Result};
use crate::tool_registry::ToolSpec;

/// Shared state a tool worker reports completion through, polled by the
/// event loop at the tool-poll floor (spec §4.6, ~50 ms) while the owning
/// agent is `ExecutingTool`.
#[derive(Debug, Default)]
pub struct ToolWorkerState {
    pub running: bool,
    pub complete: bool,
    pub result: String,
    pub result_is_error: bool,
}

/// Handle to a running tool subprocess: its process-group id plus the
/// shared completion block the worker task updates.
pub struct ToolHandle {
    pgid: Pid,
    pub state: Arc<Mutex<ToolWorkerState>>,
    join: tokio::task::JoinHandle<()>,
}

impl ToolHandle {
    /// The child's process (and group) id, satisfying the invariant
    /// `state == ExecutingTool ⇒ tool_child_pid > 0`.
    pub fn child_pid(&self) -> i32 {
        self.pgid.as_raw()
    }

    /// SIGTERM the process group, wait up to `grace`, then SIGKILL if
    /// it's still alive (spec §4.5 "Interrupt protocol").
    pub async fn interrupt(&self, grace: Duration) {
        let _ = signal::killpg(self.pgid, Signal::SIGTERM);
        tokio::time::sleep(grace).await;
        if !self.state.lock().complete {
            let _ = signal::killpg(self.pgid, Signal::SIGKILL);
        }
    }

    /// Block until the worker task has recorded completion. Used by tests;
    /// the production event loop polls `state` instead of awaiting this.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

/// Spawn `tool`'s binary with `arguments` piped as JSON on stdin, in a new
/// process group, and drive it to completion on a background task.
pub fn spawn(tool: &ToolSpec, arguments: &Value) -> Result<ToolHandle> {
    let state = Arc::new(Mutex::new(ToolWorkerState {
        running: true,
        ..Default::default()
    }));

    let mut command = Command::new(&tool.path);
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // SAFETY: `setpgid(0, 0)` only touches the child after fork, before
    // exec, and only affects the calling (child) process's own group.
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
            Ok(())
        });
    }

    let mut child = command.spawn()?;
    let pgid = Pid::from_raw(
        child
            .id()
            .ok_or_else(|| AgentError::tool("child exited before its pid could be read"))?
            as i32,
    );

    let payload = serde_json::to_vec(arguments)?;
    let mut stdin = child.stdin.take().expect("piped stdin");
    let mut stdout = child.stdout.take().expect("piped stdout");

    let worker_state = state.clone();
    let join = tokio::spawn(async move {
        let write_result = async {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
            drop(stdin);
            let mut out = Vec::new();
            stdout.read_to_end(&mut out).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((out, status))
        }
        .await;

        let mut guard = worker_state.lock();
        guard.running = false;
        guard.complete = true;
        match write_result {
            Ok((out, status)) => {
                let stdout_str = String::from_utf8_lossy(&out).into_owned();
                match serde_json::from_str::<Value>(&stdout_str) {
                    Ok(parsed) if parsed.get("error").is_some() => {
                        guard.result_is_error = true;
                        guard.result = stdout_str;
                    }
                    Ok(_) if status.success() => {
                        guard.result = stdout_str;
                    }
                    _ => {
                        guard.result_is_error = true;
                        guard.result = if stdout_str.trim().is_empty() {
                            format!("tool exited with {status}")
                        } else {
                            stdout_str
                        };
                    }
                }
            }
            Err(e) => {
                guard.result_is_error = true;
                guard.result = e.to_string();
            }
        }
    });

    Ok(ToolHandle { pgid, state, join })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_registry::ToolSpec;
    use serde_json::json;
    use std::io::Write;

    fn script_tool(body: &str) -> (tempfile::TempDir, ToolSpec) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        drop(file);
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        let spec = ToolSpec {
            name: "echo_tool".to_string(),
            description: String::new(),
            parameters: json!({}),
            path,
        };
        (dir, spec)
    }

    #[tokio::test]
    async fn successful_tool_reports_output() {
        let (_dir, tool) = script_tool("cat; echo");
        let handle = spawn(&tool, &json!({"output": "hi"})).unwrap();
        assert!(handle.child_pid() > 0);
        let state = handle.state.clone();
        handle.join().await;
        let guard = state.lock();
        assert!(guard.complete);
        assert!(!guard.result_is_error);
    }

    #[tokio::test]
    async fn nonzero_exit_marks_result_as_error() {
        let (_dir, tool) = script_tool("exit 1");
        let handle = spawn(&tool, &json!({})).unwrap();
        let state = handle.state.clone();
        handle.join().await;
        let guard = state.lock();
        assert!(guard.complete);
        assert!(guard.result_is_error);
    }

    #[tokio::test]
    async fn interrupt_kills_a_sleeping_child() {
        let (_dir, tool) = script_tool("sleep 10");
        let handle = spawn(&tool, &json!({})).unwrap();
        handle.interrupt(Duration::from_millis(50)).await;
        let guard = handle.state.lock();
        assert!(guard.complete);
    }
}
