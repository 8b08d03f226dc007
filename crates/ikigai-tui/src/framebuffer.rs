//! Framebuffer Serializer (spec §4.7): turns a cooked-terminal byte stream
//! (UTF-8 text, a subset of SGR, and a handful of cursor-control escapes)
//! into the rows×spans×style JSON document a remote backend renders.
//!
//! Grounded on `vte::Perform` the way
//! `wsp1911-BitFun`'s `util::ansi_cleaner::AnsiCleaner` drives it — one
//! `vte::Parser` fed the whole byte slice, a `Perform` impl accumulating
//! into line buffers — generalized from plain-text extraction to
//! style-tagged spans.

use serde::Serialize;
use vte::{Params, Parser, Perform};

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Style {
    pub bold: bool,
    pub dim: bool,
    pub reverse: bool,
    pub fg256: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub row: usize,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Framebuffer {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub rows: u16,
    pub cols: u16,
    pub cursor: Cursor,
    pub lines: Vec<Line>,
}

#[derive(Default)]
struct Collector {
    lines: Vec<Line>,
    current_spans: Vec<Span>,
    current_text: String,
    style: Style,
}

impl Collector {
    fn flush_span(&mut self) {
        if !self.current_text.is_empty() {
            self.current_spans.push(Span {
                text: std::mem::take(&mut self.current_text),
                style: self.style.clone(),
            });
        }
    }

    /// Ends the current row. Empty rows get a single empty span so row
    /// indices stay dense (spec §4.7).
    fn finish_row(&mut self) {
        self.flush_span();
        if self.current_spans.is_empty() {
            self.current_spans.push(Span { text: String::new(), style: self.style.clone() });
        }
        let row = self.lines.len();
        self.lines.push(Line { row, spans: std::mem::take(&mut self.current_spans) });
    }

    /// Every style change flushes the current span (spec §4.7).
    fn set_style(&mut self, new: Style) {
        if new != self.style {
            self.flush_span();
            self.style = new;
        }
    }

    fn apply_sgr(&mut self, params: &Params) {
        let mut values = params.iter().map(|p| p.first().copied().unwrap_or(0)).peekable();
        if values.peek().is_none() {
            self.set_style(Style::default());
            return;
        }
        let mut style = self.style.clone();
        let mut changed = false;
        while let Some(code) = values.next() {
            match code {
                0 => {
                    style = Style::default();
                    changed = true;
                }
                1 => {
                    style.bold = true;
                    changed = true;
                }
                2 => {
                    style.dim = true;
                    changed = true;
                }
                7 => {
                    style.reverse = true;
                    changed = true;
                }
                38 => {
                    if values.next() == Some(5) {
                        if let Some(n) = values.next() {
                            style.fg256 = Some(n as u8);
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }
        if changed {
            self.set_style(style);
        }
    }
}

impl Perform for Collector {
    fn print(&mut self, c: char) {
        self.current_text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if byte == b'\n' {
            self.finish_row();
        }
        // `\r` is ignored; `\r\n` pairs are handled entirely by the `\n`.
    }

    fn csi_dispatch(&mut self, params: &Params, _intermediates: &[u8], _ignore: bool, action: char) {
        // `?25l`/`H`/`J`/`?25h`/`r;cH` and any other unrecognized CSI are
        // all consumed to their final byte and dropped here (spec §4.7);
        // `m` (SGR) is the only sequence this layer interprets.
        if action == 'm' {
            self.apply_sgr(params);
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}
    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}
}

/// `serialize(framebuffer_bytes, rows, cols, cursor_row, cursor_col,
/// cursor_visible) -> JSON string` (spec §5, §4.7). `rows`/`cols` and the
/// cursor fields are caller-supplied terminal state, not derived from the
/// byte stream itself.
pub fn serialize(
    framebuffer_bytes: &[u8],
    rows: u16,
    cols: u16,
    cursor_row: u16,
    cursor_col: u16,
    cursor_visible: bool,
) -> String {
    let mut collector = Collector::default();
    let mut parser = Parser::new();
    parser.advance(&mut collector, framebuffer_bytes);

    if !collector.current_text.is_empty() || !collector.current_spans.is_empty() {
        collector.finish_row();
    }

    let doc = Framebuffer {
        kind: "framebuffer",
        rows,
        cols,
        cursor: Cursor { row: cursor_row, col: cursor_col, visible: cursor_visible },
        lines: collector.lines,
    };
    serde_json::to_string(&doc).expect("framebuffer document always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(bytes: &[u8]) -> serde_json::Value {
        let json = serialize(bytes, 24, 80, 0, 0, true);
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn plain_text_becomes_one_span_per_row() {
        let d = doc(b"hello\r\nworld");
        assert_eq!(d["lines"][0]["spans"][0]["text"], "hello");
        assert_eq!(d["lines"][1]["spans"][0]["text"], "world");
        assert_eq!(d["rows"], 24);
        assert_eq!(d["cols"], 80);
    }

    #[test]
    fn empty_row_gets_a_single_empty_span() {
        let d = doc(b"a\r\n\r\nb");
        assert_eq!(d["lines"][1]["spans"].as_array().unwrap().len(), 1);
        assert_eq!(d["lines"][1]["spans"][0]["text"], "");
    }

    #[test]
    fn sgr_bold_flushes_a_new_span_on_change() {
        let d = doc(b"plain\x1b[1mbold");
        let spans = d["lines"][0]["spans"].as_array().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0]["text"], "plain");
        assert_eq!(spans[0]["style"]["bold"], false);
        assert_eq!(spans[1]["text"], "bold");
        assert_eq!(spans[1]["style"]["bold"], true);
    }

    #[test]
    fn sgr_reset_clears_all_attributes() {
        let d = doc(b"\x1b[1mbold\x1b[0mplain");
        let spans = d["lines"][0]["spans"].as_array().unwrap();
        assert_eq!(spans[1]["style"]["bold"], false);
    }

    #[test]
    fn foreground_256_color_decodes_the_color_index() {
        let d = doc(b"\x1b[38;5;202mtext");
        let spans = d["lines"][0]["spans"].as_array().unwrap();
        assert_eq!(spans[0]["style"]["fg256"], 202);
    }

    #[test]
    fn unknown_csi_sequence_is_dropped_without_affecting_text() {
        let d = doc(b"\x1b[99zhello");
        assert_eq!(d["lines"][0]["spans"][0]["text"], "hello");
    }

    #[test]
    fn recognized_cursor_sequences_are_ignored_at_this_layer() {
        let d = doc(b"\x1b[?25lhello\x1b[H\x1b[J\x1b[?25h");
        assert_eq!(d["lines"][0]["spans"][0]["text"], "hello");
    }

    #[test]
    fn truncated_sequence_at_end_of_input_is_discarded_without_error() {
        let d = doc(b"hello\x1b[1");
        assert_eq!(d["lines"][0]["spans"][0]["text"], "hello");
    }
}
