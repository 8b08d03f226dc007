//! Minimal scrollback + input-line renderer, grounded on
//! `arawn-tui::ui::chat::render_chat`'s line-building style (iterate
//! messages/scrollback into `ratatui::text::Line`s, then hand them to a
//! scrolled `Paragraph`), simplified to the single active agent's
//! scrollback and input buffer this crate's event loop drives.

use ikigai_agent::Agent;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Render `agent`'s scrollback above a one-line input area showing
/// `input_buffer`.
pub fn render(frame: &mut Frame, area: Rect, agent: &Agent, input_buffer: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(area);

    render_scrollback(frame, chunks[0], agent);
    render_input(frame, chunks[1], input_buffer);
}

fn render_scrollback(frame: &mut Frame, area: Rect, agent: &Agent) {
    let lines: Vec<Line> = agent.scrollback().iter().map(|line| Line::from(line.text.clone())).collect();

    let content_height = lines.len();
    let view_height = area.height as usize;
    let scroll = content_height.saturating_sub(view_height) as u16;

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("ikigai"))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, area: Rect, input_buffer: &str) {
    let text = format!("> {input_buffer}");
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}
