//! Event Loop (spec §4.6, C6): multiplexed `select` over terminal bytes,
//! per-agent provider streams, and timeout fan-in (spinner tick, tool-poll
//! floor, scroll detector), grounded on `arawn-tui::events::EventHandler`'s
//! `tokio::select!` mixing of a `crossterm::event::EventStream` with a
//! tick interval, generalized to multiple agents and a raw-byte input path.

use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::SelectAll;
use futures::{Stream, StreamExt};
use ikigai_agent::Agent;
use ikigai_types::StreamEvent;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

use crate::debug_pipe::DebugManager;
use crate::decoder::{InputAction, InputDecoder};
use crate::renderer;
use crate::scroll::{Clock, Direction as ScrollDir, ScrollDetector, ScrollOutcome, SystemClock};
use crate::terminal::Tui;

/// Spinner animation tick (spec §4.6 step 2).
const SPINNER_TICK_MS: u64 = 80;
/// Tool-poll floor while any agent is `ExecutingTool` (spec §4.6 step 2).
const TOOL_POLL_FLOOR_MS: u64 = 50;
/// Used when nothing else bounds the wait (spec §4.6 step 2).
const DEFAULT_TIMEOUT_MS: u64 = 1000;

type TaggedStream = Pin<Box<dyn Stream<Item = (Uuid, StreamEvent)> + Send>>;

struct Session {
    agent: Agent,
    input_buffer: String,
    history: Vec<String>,
    history_cursor: Option<usize>,
}

impl Session {
    fn new(agent: Agent) -> Self {
        Self {
            agent,
            input_buffer: String::new(),
            history: Vec::new(),
            history_cursor: None,
        }
    }
}

/// Drives any number of [`Agent`]s from one terminal. Owns the scroll
/// detector and input decoder (both per-terminal, not per-agent).
pub struct EventLoop {
    decoder: InputDecoder,
    scroll: ScrollDetector,
    clock: Box<dyn Clock>,
    sessions: HashMap<Uuid, Session>,
    order: Vec<Uuid>,
    active: usize,
    streams: SelectAll<TaggedStream>,
    spinner_visible: bool,
    spinner_frame: u32,
    debug: DebugManager,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            decoder: InputDecoder::new(),
            scroll: ScrollDetector::new(),
            clock,
            sessions: HashMap::new(),
            order: Vec::new(),
            active: 0,
            streams: SelectAll::new(),
            spinner_visible: false,
            spinner_frame: 0,
            debug: DebugManager::new(),
        }
    }

    /// Registers a debug-output source (e.g. a tool subprocess's stderr).
    /// Lines are always drained so the writer never blocks; whether they
    /// reach scrollback depends on [`EventLoop::set_debug_enabled`].
    pub fn add_debug_pipe<R>(&mut self, prefix: impl Into<String>, reader: R)
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
    {
        self.debug.add_pipe(prefix, reader);
    }

    pub fn set_debug_enabled(&mut self, enabled: bool) {
        self.debug.set_enabled(enabled);
    }

    pub fn add_agent(&mut self, agent: Agent) -> Uuid {
        let id = agent.id;
        self.sessions.insert(id, Session::new(agent));
        self.order.push(id);
        id
    }

    pub fn active_agent(&self) -> Option<&Agent> {
        self.order.get(self.active).and_then(|id| self.sessions.get(id)).map(|s| &s.agent)
    }

    fn active_id(&self) -> Option<Uuid> {
        self.order.get(self.active).copied()
    }

    fn next_agent(&mut self) {
        if !self.order.is_empty() {
            self.active = (self.active + 1) % self.order.len();
        }
    }

    fn prev_agent(&mut self) {
        if !self.order.is_empty() {
            self.active = (self.active + self.order.len() - 1) % self.order.len();
        }
    }

    fn any_executing_tool(&self) -> bool {
        self.sessions.values().any(|s| s.agent.state().is_executing_tool())
    }

    /// Spec §4.6 step 2: minimum of spinner tick, tool-poll floor, and the
    /// scroll detector's pending timeout; falls back to a 1 s default.
    fn compute_timeout(&self, now_ms: u64) -> Duration {
        let mut candidates = Vec::new();
        if self.spinner_visible {
            candidates.push(SPINNER_TICK_MS);
        }
        if self.any_executing_tool() {
            candidates.push(TOOL_POLL_FLOOR_MS);
        }
        if let Some(at) = self.scroll.next_timeout() {
            candidates.push(at.saturating_sub(now_ms));
        }
        let ms = candidates.into_iter().min().unwrap_or(DEFAULT_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    fn push_stream(&mut self, id: Uuid, stream: ikigai_llm::provider::EventStream) {
        let tagged: TaggedStream = Box::pin(stream.map(move |event| (id, event)));
        self.streams.push(tagged);
    }

    /// Main loop. Exits cleanly when `stdin` returns 0 bytes (spec §4.6
    /// step 4 "end-of-input"). Redraws `terminal` once per iteration, after
    /// the dispatched action and any tool-completion polling have settled.
    pub async fn run<R>(&mut self, mut stdin: R, terminal: &mut Tui) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.draw(terminal)?;
        let mut buf = [0u8; 256];
        loop {
            let now = self.clock.now_ms();
            let timeout = self.compute_timeout(now);

            tokio::select! {
                read = stdin.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }
                    for &byte in &buf[..n] {
                        self.dispatch_byte(byte).await;
                    }
                }
                next = self.streams.next(), if !self.streams.is_empty() => {
                    if let Some((id, event)) = next {
                        self.dispatch_stream_event(id, event).await;
                    }
                }
                line = self.debug.next_line(), if !self.debug.is_empty() => {
                    if let Some(line) = line {
                        self.dispatch_debug_line(line);
                    }
                }
                _ = tokio::time::sleep(timeout) => {
                    self.dispatch_timeout();
                }
            }

            self.poll_tools().await;
            self.draw(terminal)?;
        }
    }

    fn draw(&self, terminal: &mut Tui) -> anyhow::Result<()> {
        let Some(id) = self.active_id() else { return Ok(()) };
        let Some(session) = self.sessions.get(&id) else { return Ok(()) };
        terminal.draw(|frame| {
            renderer::render(frame, frame.area(), &session.agent, &session.input_buffer);
        })?;
        Ok(())
    }

    async fn dispatch_byte(&mut self, byte: u8) {
        if let Some(action) = self.decoder.feed(byte) {
            self.dispatch_action(action).await;
        }
    }

    async fn dispatch_action(&mut self, action: InputAction) {
        let now = self.clock.now_ms();
        match action {
            InputAction::CursorUp => self.route_scroll(now, ScrollDir::Up),
            InputAction::CursorDown => self.route_scroll(now, ScrollDir::Down),
            other => {
                self.flush_scroll();
                self.handle_non_scroll_action(other).await;
            }
        }
    }

    fn route_scroll(&mut self, now: u64, dir: ScrollDir) {
        match self.scroll.process_arrow(now, dir) {
            ScrollOutcome::Arrow(d) => self.navigate_history(d),
            ScrollOutcome::Scroll(_) | ScrollOutcome::Absorbed | ScrollOutcome::None => {}
        }
    }

    fn flush_scroll(&mut self) {
        if let ScrollOutcome::Arrow(d) = self.scroll.flush() {
            self.navigate_history(d);
        }
    }

    fn navigate_history(&mut self, dir: ScrollDir) {
        let Some(id) = self.active_id() else { return };
        let Some(session) = self.sessions.get_mut(&id) else { return };
        if session.history.is_empty() {
            return;
        }
        let next = match (dir, session.history_cursor) {
            (ScrollDir::Up, None) => session.history.len() - 1,
            (ScrollDir::Up, Some(i)) => i.saturating_sub(1),
            (ScrollDir::Down, Some(i)) if i + 1 < session.history.len() => i + 1,
            (ScrollDir::Down, _) => {
                session.history_cursor = None;
                session.input_buffer.clear();
                return;
            }
        };
        session.history_cursor = Some(next);
        session.input_buffer = session.history[next].clone();
    }

    async fn handle_non_scroll_action(&mut self, action: InputAction) {
        let Some(id) = self.active_id() else { return };

        match action {
            InputAction::Char(c) => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.input_buffer.push(c);
                }
            }
            InputAction::Backspace => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.input_buffer.pop();
                }
            }
            InputAction::KillLine => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.input_buffer.clear();
                }
            }
            InputAction::KillToEnd => {
                // Cursor is always at the end of the buffer in this minimal
                // line editor, so kill-to-end is equivalent to kill-line.
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.input_buffer.clear();
                }
            }
            InputAction::DeleteWordBack => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    let trimmed = session.input_buffer.trim_end();
                    let cut = trimmed.rfind(' ').map(|i| i + 1).unwrap_or(0);
                    session.input_buffer.truncate(cut);
                }
            }
            InputAction::HistoryPrev => self.navigate_history(ScrollDir::Up),
            InputAction::HistoryNext => self.navigate_history(ScrollDir::Down),
            InputAction::InsertNewline => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.input_buffer.push('\n');
                }
            }
            InputAction::Newline => self.submit_active().await,
            InputAction::Escape | InputAction::Interrupt => {
                if let Some(session) = self.sessions.get_mut(&id) {
                    session.agent.handle_interrupt_request().await;
                }
            }
            InputAction::Tab => {
                self.next_agent();
            }
            InputAction::CursorLeft
            | InputAction::CursorRight
            | InputAction::CursorLineStart
            | InputAction::CursorLineEnd
            | InputAction::PageUp
            | InputAction::PageDown
            | InputAction::CtrlArrow(_)
            | InputAction::Unknown => {}
        }
    }

    async fn submit_active(&mut self) {
        let Some(id) = self.active_id() else { return };
        let Some(session) = self.sessions.get_mut(&id) else { return };
        if !session.agent.state().is_idle() || session.input_buffer.trim().is_empty() {
            return;
        }
        let text = std::mem::take(&mut session.input_buffer);
        session.history.push(text.clone());
        session.history_cursor = None;
        let stream = session.agent.submit_user_message(text);
        self.push_stream(id, stream);
    }

    async fn dispatch_stream_event(&mut self, id: Uuid, event: StreamEvent) {
        let is_terminal = matches!(event, StreamEvent::Done { .. } | StreamEvent::Error { .. });
        if let Some(session) = self.sessions.get_mut(&id) {
            session.agent.on_stream_event(event);
            if is_terminal {
                let _ = session.agent.on_stream_complete().await;
            }
        }
    }

    /// Spec §4.6 step 6: debug pipes are always drained; lines only reach
    /// scrollback when debug output is enabled.
    fn dispatch_debug_line(&mut self, line: crate::debug_pipe::DebugLine) {
        if !self.debug.enabled() {
            return;
        }
        let Some(id) = self.active_id() else { return };
        if let Some(session) = self.sessions.get_mut(&id) {
            session.agent.push_debug_line(format!("{} {}", line.prefix, line.text));
        }
    }

    async fn poll_tools(&mut self) {
        let ids: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.agent.state().is_executing_tool())
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            let next_stream = if let Some(session) = self.sessions.get_mut(&id) {
                session.agent.poll_tool_completion().await.ok().flatten()
            } else {
                None
            };
            if let Some(stream) = next_stream {
                self.push_stream(id, stream);
            }
        }
    }

    /// Spec §4.6 step 8: advance spinner frames, probe the scroll
    /// detector's flush timeout.
    fn dispatch_timeout(&mut self) {
        if self.spinner_visible {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
        }
        let now = self.clock.now_ms();
        if let ScrollOutcome::Arrow(d) = self.scroll.on_timeout(now) {
            self.navigate_history(d);
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
