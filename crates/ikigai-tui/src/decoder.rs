//! Input Decoder (spec §4.2, C2): a byte-at-a-time parser over an
//! escape-sequence buffer and UTF-8 accumulator, independent of any
//! terminal library. Feeds raw bytes (as read from the tty fd) one at a
//! time and yields [`InputAction`]s in arrival order.

use std::collections::VecDeque;

/// One decoded keyboard action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Char(char),
    Backspace,
    KillToEnd,
    KillLine,
    DeleteWordBack,
    CursorLineStart,
    CursorLineEnd,
    HistoryPrev,
    HistoryNext,
    Tab,
    Escape,
    Interrupt,
    PageUp,
    PageDown,
    Newline,
    InsertNewline,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    CtrlArrow(Direction),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// xkb keycodes (Linux evdev-offset) for the four arrow keys; all fall
/// within the ASCII-sized reverse-map range (spec §9 open question).
const KEYCODE_UP: usize = 111;
const KEYCODE_DOWN: usize = 116;
const KEYCODE_LEFT: usize = 113;
const KEYCODE_RIGHT: usize = 114;

/// CSI-u modifier value for a bare Ctrl chord (xterm convention:
/// `1 + shift(1) + alt(2) + ctrl(4)`).
const MODIFIER_CTRL: u32 = 5;

fn build_reverse_keymap() -> [Option<Direction>; 128] {
    let mut map = [None; 128];
    map[KEYCODE_UP] = Some(Direction::Up);
    map[KEYCODE_DOWN] = Some(Direction::Down);
    map[KEYCODE_LEFT] = Some(Direction::Left);
    map[KEYCODE_RIGHT] = Some(Direction::Right);
    map
}

#[derive(Debug, Clone)]
enum Mode {
    Normal,
    Utf8 { buf: [u8; 4], len: usize, expected: usize },
    Escape,
    Csi { params: String },
}

/// Byte-level decoder. Purely functional over its input bytes: state is
/// entirely the escape/UTF-8 accumulator, never terminal timing.
pub struct InputDecoder {
    mode: Mode,
    /// Bytes read but not yet run through the state machine: populated when
    /// a byte has to be re-processed from a clean state (see `feed_escape`)
    /// after a `feed()` call already has an action to return.
    queue: VecDeque<u8>,
    reverse_keymap: [Option<Direction>; 128],
}

impl InputDecoder {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            queue: VecDeque::new(),
            reverse_keymap: build_reverse_keymap(),
        }
    }

    /// Feed one byte; returns the next completed action, if any. A byte can
    /// produce zero actions (e.g. the first byte of a UTF-8 sequence) or be
    /// requeued for a later call (e.g. the byte right after a lone ESC), so
    /// the action returned may describe a byte fed on a previous call.
    pub fn feed(&mut self, byte: u8) -> Option<InputAction> {
        self.queue.push_back(byte);
        while let Some(next) = self.queue.pop_front() {
            if let Some(action) = self.feed_dispatch(next) {
                return Some(action);
            }
        }
        None
    }

    fn feed_dispatch(&mut self, byte: u8) -> Option<InputAction> {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => self.feed_normal(byte),
            Mode::Utf8 { mut buf, len, expected } => {
                buf[len] = byte;
                let len = len + 1;
                if len < expected {
                    self.mode = Mode::Utf8 { buf, len, expected };
                    None
                } else {
                    match std::str::from_utf8(&buf[..len]) {
                        Ok(s) => s.chars().next().map(InputAction::Char),
                        Err(_) => Some(InputAction::Unknown),
                    }
                }
            }
            Mode::Escape => self.feed_escape(byte),
            Mode::Csi { params } => self.feed_csi(params, byte),
        }
    }

    fn feed_normal(&mut self, byte: u8) -> Option<InputAction> {
        match byte {
            0x1B => {
                self.mode = Mode::Escape;
                None
            }
            0x7F | 0x08 => Some(InputAction::Backspace),
            0x09 => Some(InputAction::Tab),
            0x0D => Some(InputAction::Newline),
            0x01 => Some(InputAction::CursorLineStart),
            0x03 => Some(InputAction::Interrupt),
            0x05 => Some(InputAction::CursorLineEnd),
            0x0A => Some(InputAction::InsertNewline),
            0x0B => Some(InputAction::KillToEnd),
            0x0E => Some(InputAction::HistoryNext),
            0x10 => Some(InputAction::HistoryPrev),
            0x15 => Some(InputAction::KillLine),
            0x17 => Some(InputAction::DeleteWordBack),
            0x20..=0x7E => Some(InputAction::Char(byte as char)),
            _ => {
                if let Some(expected) = utf8_sequence_len(byte) {
                    let mut buf = [0u8; 4];
                    buf[0] = byte;
                    self.mode = Mode::Utf8 { buf, len: 1, expected };
                    None
                } else {
                    Some(InputAction::Unknown)
                }
            }
        }
    }

    fn feed_escape(&mut self, byte: u8) -> Option<InputAction> {
        if byte == b'[' {
            self.mode = Mode::Csi { params: String::new() };
            None
        } else {
            // A lone ESC not followed by '[' is the Escape key. `byte`
            // belongs to the next logical action, not this one; requeue it
            // so a later `feed()` call decodes it from a clean state.
            self.queue.push_front(byte);
            Some(InputAction::Escape)
        }
    }

    fn feed_csi(&mut self, mut params: String, byte: u8) -> Option<InputAction> {
        if (0x40..=0x7E).contains(&byte) {
            Some(self.finish_csi(&params, byte as char))
        } else {
            params.push(byte as char);
            self.mode = Mode::Csi { params };
            None
        }
    }

    fn finish_csi(&self, params: &str, final_byte: char) -> InputAction {
        match final_byte {
            'A' | 'B' | 'C' | 'D' => {
                let dir = match final_byte {
                    'A' => Direction::Up,
                    'B' => Direction::Down,
                    'C' => Direction::Right,
                    _ => Direction::Left,
                };
                let modifier = params.split(';').nth(1).and_then(|m| m.parse::<u32>().ok());
                match modifier {
                    Some(MODIFIER_CTRL) => InputAction::CtrlArrow(dir),
                    _ => plain_arrow(dir),
                }
            }
            '~' => match params {
                "5" => InputAction::PageUp,
                "6" => InputAction::PageDown,
                _ => InputAction::Unknown,
            },
            'u' => {
                let mut parts = params.split(';');
                let keycode = parts.next().and_then(|k| k.parse::<usize>().ok());
                let modifier = parts.next().and_then(|m| m.parse::<u32>().ok());
                match (keycode, modifier) {
                    (Some(code), Some(MODIFIER_CTRL)) if code < 128 => self
                        .reverse_keymap
                        .get(code)
                        .copied()
                        .flatten()
                        .map(InputAction::CtrlArrow)
                        .unwrap_or(InputAction::Unknown),
                    _ => InputAction::Unknown,
                }
            }
            _ => InputAction::Unknown,
        }
    }
}

fn plain_arrow(dir: Direction) -> InputAction {
    match dir {
        Direction::Up => InputAction::CursorUp,
        Direction::Down => InputAction::CursorDown,
        Direction::Left => InputAction::CursorLeft,
        Direction::Right => InputAction::CursorRight,
    }
}

fn utf8_sequence_len(first_byte: u8) -> Option<usize> {
    match first_byte {
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_str(decoder: &mut InputDecoder, bytes: &[u8]) -> Vec<InputAction> {
        bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
    }

    #[test]
    fn ascii_characters_pass_through() {
        let mut d = InputDecoder::new();
        assert_eq!(feed_str(&mut d, b"hi"), vec![InputAction::Char('h'), InputAction::Char('i')]);
    }

    #[test]
    fn multibyte_utf8_assembles_into_one_codepoint() {
        let mut d = InputDecoder::new();
        let bytes = "é".as_bytes();
        assert_eq!(bytes.len(), 2);
        let actions = feed_str(&mut d, bytes);
        assert_eq!(actions, vec![InputAction::Char('é')]);
    }

    #[test]
    fn ctrl_chords_map_to_line_editing_actions() {
        let mut d = InputDecoder::new();
        assert_eq!(d.feed(0x01), Some(InputAction::CursorLineStart));
        assert_eq!(d.feed(0x0B), Some(InputAction::KillToEnd));
        assert_eq!(d.feed(0x15), Some(InputAction::KillLine));
        assert_eq!(d.feed(0x17), Some(InputAction::DeleteWordBack));
    }

    #[test]
    fn ctrl_j_is_insert_newline_distinct_from_enter() {
        let mut d = InputDecoder::new();
        assert_eq!(d.feed(0x0A), Some(InputAction::InsertNewline));
        assert_eq!(d.feed(0x0D), Some(InputAction::Newline));
    }

    #[test]
    fn bare_escape_emits_escape_action() {
        let mut d = InputDecoder::new();
        assert_eq!(d.feed(0x1B), None);
        assert_eq!(d.feed(b'q'), Some(InputAction::Escape));
    }

    #[test]
    fn byte_after_bare_escape_is_not_dropped() {
        let mut d = InputDecoder::new();
        assert_eq!(d.feed(0x1B), None);
        assert_eq!(d.feed(b'q'), Some(InputAction::Escape));
        // `q` was requeued rather than swallowed; the next feed() call
        // decodes it, even though it passes in an unrelated byte.
        assert_eq!(d.feed(b'x'), Some(InputAction::Char('q')));
        assert_eq!(d.feed(b'y'), Some(InputAction::Char('x')));
        assert_eq!(d.feed(b'z'), Some(InputAction::Char('y')));
    }

    #[test]
    fn plain_arrow_keys_decode_without_modifier() {
        let mut d = InputDecoder::new();
        let actions = feed_str(&mut d, b"\x1b[A");
        assert_eq!(actions, vec![InputAction::CursorUp]);
    }

    #[test]
    fn ctrl_arrow_decodes_via_modifier_parameter() {
        let mut d = InputDecoder::new();
        let actions = feed_str(&mut d, b"\x1b[1;5A");
        assert_eq!(actions, vec![InputAction::CtrlArrow(Direction::Up)]);
    }

    #[test]
    fn csi_u_ctrl_arrow_resolves_via_reverse_keymap() {
        let mut d = InputDecoder::new();
        let actions = feed_str(&mut d, b"\x1b[111;5u");
        assert_eq!(actions, vec![InputAction::CtrlArrow(Direction::Up)]);
    }

    #[test]
    fn csi_u_non_ascii_keycode_is_unknown() {
        let mut d = InputDecoder::new();
        let actions = feed_str(&mut d, b"\x1b[57352;5u");
        assert_eq!(actions, vec![InputAction::Unknown]);
    }

    #[test]
    fn page_up_down_sequences_decode() {
        let mut d = InputDecoder::new();
        assert_eq!(feed_str(&mut d, b"\x1b[5~"), vec![InputAction::PageUp]);
        assert_eq!(feed_str(&mut d, b"\x1b[6~"), vec![InputAction::PageDown]);
    }

    #[test]
    fn unrecognized_csi_sequence_is_unknown() {
        let mut d = InputDecoder::new();
        assert_eq!(feed_str(&mut d, b"\x1b[99z"), vec![InputAction::Unknown]);
    }
}
