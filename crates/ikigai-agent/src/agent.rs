//! Agent state machine (spec §4.4, C4).
//!
//! Grounded on `arawn-agent::agent::Agent`'s ownership of a backend, tool
//! registry, and config, restructured around the explicit
//! `Idle`/`WaitingForLlm`/`ExecutingTool` enum spec §4.4 names instead of
//! the teacher's implicit call-and-await loop.

use std::sync::Arc;

use ikigai_llm::Provider;
use ikigai_types::{
    AgentState, ContentBlock, FinishReason, Message, Request, Scrollback, StreamEvent,
    ThinkingLevel, ToolCall, Usage,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::sink::{self, DbSink};
use crate::tool_exec::{self, ToolHandle};
use crate::tool_registry::ToolRegistry;
use crate::types::AgentConfig;

/// Resources shared by every agent in a session (spec §3 "reference to a
/// shared context").
pub struct AgentContext {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub tools: Arc<ToolRegistry>,
    pub db_sink: Option<Arc<dyn DbSink>>,
    pub session_id: Option<String>,
    pub config: AgentConfig,
}

/// Response metadata captured from the last completion (spec §3), kept for
/// database persistence (spec §4.4 "Usage recording").
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub model: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub thinking_level: Option<ThinkingLevel>,
    pub usage: Usage,
}

/// One conversational agent. Owns its scrollback and in-flight tool/stream
/// bookkeeping exclusively; the shared [`AgentContext`] is the only resource
/// it shares with sibling agents. The composing terminal input buffer is
/// owned per-session by the event loop, not here, since it outlives any
/// single agent turn and the event loop is what reads raw bytes off the tty.
pub struct Agent {
    pub id: Uuid,
    state: AgentState,
    context: Arc<AgentContext>,
    system_prompt: Option<String>,
    messages: Vec<Message>,
    scrollback: Scrollback,
    streaming_line_buffer: String,
    pending_tool_call: Option<ToolCall>,
    pending_text: String,
    tool_iteration_count: u32,
    interrupt_requested: bool,
    tool_handle: Option<ToolHandle>,
    cancel_token: Option<CancellationToken>,
    last_error: Option<String>,
    meta: ResponseMeta,
}

impl Agent {
    pub fn new(context: Arc<AgentContext>, system_prompt: Option<String>) -> Self {
        let scrollback = Scrollback::new(context.config.scrollback_capacity);
        Self {
            id: Uuid::new_v4(),
            state: AgentState::Idle,
            context,
            system_prompt,
            messages: Vec::new(),
            scrollback,
            streaming_line_buffer: String::new(),
            pending_tool_call: None,
            pending_text: String::new(),
            tool_iteration_count: 0,
            interrupt_requested: false,
            tool_handle: None,
            cancel_token: None,
            last_error: None,
            meta: ResponseMeta::default(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    /// Appends a line from a debug pipe (spec §4.6 step 6) straight to
    /// scrollback, bypassing message history.
    pub fn push_debug_line(&mut self, line: impl Into<String>) {
        self.scrollback.push_line(line);
    }

    pub fn tool_child_pid(&self) -> i32 {
        self.tool_handle.as_ref().map(ToolHandle::child_pid).unwrap_or(0)
    }

    fn build_request(&self, tools: bool) -> Request {
        let mut request = Request::new(self.context.model.clone(), self.messages.clone());
        if let Some(prompt) = &self.system_prompt {
            request = request.with_system_prompt(prompt.clone());
        }
        if tools {
            let defs = self.context.tools.to_tool_definitions();
            if !defs.is_empty() {
                request = request.with_tools(defs);
            }
        }
        request
    }

    /// `Idle → WaitingForLlm`: appends the user message and starts a stream.
    pub fn submit_user_message(&mut self, text: impl Into<String>) -> ikigai_llm::provider::EventStream {
        self.messages.push(Message::user(text));
        self.start_stream()
    }

    fn start_stream(&mut self) -> ikigai_llm::provider::EventStream {
        self.state = AgentState::WaitingForLlm;
        self.pending_text.clear();
        self.streaming_line_buffer.clear();
        self.pending_tool_call = None;
        self.last_error = None;

        let request = self.build_request(true);
        let (stream, token) = self.context.provider.stream(request);
        self.cancel_token = Some(token);
        stream
    }

    /// Route one stream event into agent state (spec §4.4 `stream_cb`).
    pub fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Start { model } => {
                self.meta.model = Some(model);
            }
            StreamEvent::TextDelta { text, .. } | StreamEvent::ThinkingDelta { text, .. } => {
                self.append_stream_text(&text);
            }
            StreamEvent::ToolCallStart { id, name, .. } => {
                self.pending_tool_call = Some(ToolCall::new(id, name));
            }
            StreamEvent::ToolCallDelta { args_json_fragment, .. } => {
                if let Some(call) = &mut self.pending_tool_call {
                    call.append_arguments(&args_json_fragment);
                }
            }
            StreamEvent::ToolCallDone { .. } => {}
            StreamEvent::Done { finish_reason, usage, .. } => {
                self.meta.finish_reason = Some(finish_reason);
                self.meta.usage = usage;
            }
            StreamEvent::Error { message, .. } => {
                self.last_error = Some(message);
            }
        }
    }

    /// Any newline in arriving text splits the buffer at the last newline
    /// (spec §4.4 "Streaming buffer flush rule").
    fn append_stream_text(&mut self, text: &str) {
        self.pending_text.push_str(text);
        self.streaming_line_buffer.push_str(text);
        if let Some(last_nl) = self.streaming_line_buffer.rfind('\n') {
            let complete_len = last_nl + 1;
            let complete: String = self.streaming_line_buffer.drain(..complete_len).collect();
            for line in complete.split_inclusive('\n') {
                self.scrollback.push_line(line.trim_end_matches('\n'));
            }
        }
    }

    /// Flushed unconditionally on stream completion, success or error.
    fn flush_streaming_buffer(&mut self) {
        if !self.streaming_line_buffer.is_empty() {
            let line = std::mem::take(&mut self.streaming_line_buffer);
            self.scrollback.push_line(line);
        }
    }

    /// Called once the stream has ended (`Done` seen, or the stream closed).
    /// Performs `WaitingForLlm → ExecutingTool` or `WaitingForLlm → Idle`.
    pub async fn on_stream_complete(&mut self) -> Result<()> {
        self.flush_streaming_buffer();
        self.cancel_token = None;

        if let Some(error) = self.last_error.take() {
            self.scrollback.push_line(format!("error: {error}"));
        }

        if let Some(call) = self.pending_tool_call.take() {
            let mut content = Vec::new();
            if !self.pending_text.is_empty() {
                content.push(ContentBlock::text(self.pending_text.clone()));
            }
            content.push(ContentBlock::tool_call(
                call.id.clone(),
                call.name.clone(),
                call.arguments_or_empty_object(),
            ));
            self.messages.push(Message::assistant(content));
            self.persist_assistant().await?;
            self.start_tool(call).await?;
        } else {
            if !self.pending_text.is_empty() {
                self.messages
                    .push(Message::assistant(vec![ContentBlock::text(self.pending_text.clone())]));
            }
            self.persist_assistant().await?;
            self.pending_text.clear();
            self.meta = ResponseMeta::default();
            self.state = AgentState::Idle;
        }
        Ok(())
    }

    async fn persist_assistant(&self) -> Result<()> {
        let Some(sink) = &self.context.db_sink else { return Ok(()) };
        let Some(session_id) = &self.context.session_id else { return Ok(()) };
        let data = json!({
            "model": self.meta.model,
            "finish_reason": self.meta.finish_reason.map(|f| f.as_db_str()),
            "thinking_level": self.meta.thinking_level,
            "usage": self.meta.usage,
        })
        .to_string();
        sink.insert_message(
            session_id,
            &self.id.to_string(),
            sink::KIND_ASSISTANT,
            &self.pending_text,
            Some(&data),
        )
        .await
    }

    /// `WaitingForLlm → ExecutingTool` (spec §4.5).
    async fn start_tool(&mut self, call: ToolCall) -> Result<()> {
        let arguments: serde_json::Value =
            serde_json::from_str(call.arguments_or_empty_object()).unwrap_or(json!({}));
        let tool = self
            .context
            .tools
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        self.context.tools.validate_arguments(&call.name, &arguments)?;

        let handle = tool_exec::spawn(tool, &arguments)?;
        self.tool_handle = Some(handle);
        self.pending_tool_call = Some(call);
        self.pending_text.clear();
        self.state = AgentState::ExecutingTool;
        Ok(())
    }

    /// Non-blocking poll at the tool-poll floor (spec §4.6, ≈50 ms) while
    /// `state == ExecutingTool`. Returns `true` if a continuation request
    /// was submitted and a new stream is now in flight.
    pub async fn poll_tool_completion(&mut self) -> Result<Option<ikigai_llm::provider::EventStream>> {
        if self.state != AgentState::ExecutingTool {
            return Ok(None);
        }
        let complete = self
            .tool_handle
            .as_ref()
            .map(|h| h.state.lock().complete)
            .unwrap_or(false);
        if !complete {
            return Ok(None);
        }

        let handle = self.tool_handle.take().expect("checked above");
        let (result, is_error) = {
            let guard = handle.state.lock();
            (guard.result.clone(), guard.result_is_error)
        };
        handle.join().await;
        let call = self.pending_tool_call.take();

        if self.interrupt_requested {
            self.interrupt_requested = false;
            self.scrollback.push_line("Interrupted");
            if let Some(sink) = &self.context.db_sink {
                if let Some(session_id) = &self.context.session_id {
                    sink.insert_message(
                        session_id,
                        &self.id.to_string(),
                        sink::KIND_INTERRUPTED,
                        "",
                        None,
                    )
                    .await?;
                }
            }
            self.state = AgentState::Idle;
            return Ok(None);
        }

        if let Some(call) = call {
            self.messages
                .push(Message::tool_result(call.id.clone(), call.name.clone(), result.clone(), is_error));
            self.tool_iteration_count += 1;
            if let Some(sink) = &self.context.db_sink {
                if let Some(session_id) = &self.context.session_id {
                    sink.insert_message(
                        session_id,
                        &self.id.to_string(),
                        sink::KIND_TOOL,
                        &result,
                        None,
                    )
                    .await?;
                }
            }
        }

        if self.should_continue_tool_loop() {
            let stream = self.start_stream();
            Ok(Some(stream))
        } else {
            self.state = AgentState::Idle;
            Ok(None)
        }
    }

    /// Bounded by an iteration budget and by the last finish reason being
    /// `ToolUse` (spec §4.4 "Tool loop budget").
    fn should_continue_tool_loop(&self) -> bool {
        self.meta.finish_reason == Some(FinishReason::ToolUse)
            && self.tool_iteration_count < self.context.config.max_tool_iterations
    }

    /// Escape routed through C6 (spec §4.5 "Interrupt during WaitingForLlm",
    /// §4.6 "Cancellation semantics").
    pub async fn handle_interrupt_request(&mut self) {
        self.interrupt_requested = true;
        match self.state {
            AgentState::WaitingForLlm => {
                if let Some(token) = self.cancel_token.take() {
                    token.cancel();
                }
            }
            AgentState::ExecutingTool => {
                if let Some(handle) = &self.tool_handle {
                    handle.interrupt(self.context.config.sigterm_grace).await;
                }
            }
            AgentState::Idle => {
                self.interrupt_requested = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> AgentContext {
        AgentContext {
            provider: Arc::new(NullProvider),
            model: "gemini-test".to_string(),
            tools: Arc::new(ToolRegistry::new()),
            db_sink: None,
            session_id: None,
            config: AgentConfig::default(),
        }
    }

    struct NullProvider;

    #[async_trait::async_trait]
    impl Provider for NullProvider {
        fn name(&self) -> &str {
            "null"
        }
        async fn complete(&self, _request: Request) -> ikigai_llm::Result<ikigai_types::Response> {
            unimplemented!()
        }
        fn stream(&self, _request: Request) -> (ikigai_llm::provider::EventStream, CancellationToken) {
            unimplemented!()
        }
    }

    #[test]
    fn new_agent_starts_idle() {
        let agent = Agent::new(Arc::new(test_context()), None);
        assert_eq!(agent.state(), AgentState::Idle);
        assert_eq!(agent.tool_child_pid(), 0);
    }

    #[test]
    fn stream_text_flushes_complete_lines_and_keeps_partial_tail() {
        let mut agent = Agent::new(Arc::new(test_context()), None);
        agent.append_stream_text("hello\nworld");
        assert_eq!(agent.scrollback.len(), 1);
        assert_eq!(agent.scrollback.iter().next().unwrap().text, "hello");
        assert_eq!(agent.streaming_line_buffer, "world");
        assert_eq!(agent.pending_text, "hello\nworld");
    }

    #[test]
    fn flush_streaming_buffer_emits_residual_without_trailing_newline() {
        let mut agent = Agent::new(Arc::new(test_context()), None);
        agent.append_stream_text("partial");
        agent.flush_streaming_buffer();
        assert_eq!(agent.scrollback.len(), 1);
        assert_eq!(agent.scrollback.iter().next().unwrap().text, "partial");
        assert!(agent.streaming_line_buffer.is_empty());
    }

    #[test]
    fn should_continue_tool_loop_respects_budget_and_finish_reason() {
        let mut agent = Agent::new(Arc::new(test_context()), None);
        agent.meta.finish_reason = Some(FinishReason::ToolUse);
        assert!(agent.should_continue_tool_loop());
        agent.tool_iteration_count = agent.context.config.max_tool_iterations;
        assert!(!agent.should_continue_tool_loop());
    }

    #[test]
    fn should_continue_tool_loop_false_when_finish_reason_is_stop() {
        let mut agent = Agent::new(Arc::new(test_context()), None);
        agent.meta.finish_reason = Some(FinishReason::Stop);
        assert!(!agent.should_continue_tool_loop());
    }
}
