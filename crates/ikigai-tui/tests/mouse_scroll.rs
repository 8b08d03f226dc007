//! Integration test for the full mouse-scroll-vs-keypress pipeline: raw
//! terminal bytes through the decoder, then the decoder's plain arrow
//! actions through the scroll detector, matching the flow
//! `EventLoop::dispatch_action` drives (spec §4.1, §4.2).
//!
//! Grounded on `original_source/tests/integration/mouse_scroll_test.c`,
//! which exercises the same "terminal emits something, the higher layer
//! must classify it correctly" property, generalized from C's mocked
//! posix mouse-capture writes to this crate's byte-level decode path.

use ikigai_tui::decoder::{Direction as KeyDirection, InputAction, InputDecoder};
use ikigai_tui::scroll::{Direction as ScrollDirection, ScrollDetector, ScrollOutcome};

/// A terminal in legacy (non-SGR-mouse) mode reports a wheel notch as a
/// burst of plain `ESC [ A` / `ESC [ B` arrow sequences with no modifier,
/// indistinguishable at the byte level from someone holding the real
/// arrow key down. Only timing (fed through the scroll detector)
/// resolves the ambiguity.
fn decode_all(decoder: &mut InputDecoder, bytes: &[u8]) -> Vec<InputAction> {
    bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
}

#[test]
fn a_fast_burst_of_decoded_up_arrows_is_recognized_as_a_scroll() {
    let mut decoder = InputDecoder::new();
    let mut scroll = ScrollDetector::new();

    let actions = decode_all(&mut decoder, b"\x1b[A\x1b[A\x1b[A");
    assert_eq!(actions, vec![InputAction::CursorUp, InputAction::CursorUp, InputAction::CursorUp]);

    let mut outcomes = Vec::new();
    for (i, action) in actions.iter().enumerate() {
        assert_eq!(*action, InputAction::CursorUp);
        let now = 1000 + i as u64;
        outcomes.push(scroll.process_arrow(now, ScrollDirection::Up));
    }

    assert_eq!(outcomes, vec![ScrollOutcome::None, ScrollOutcome::Scroll(ScrollDirection::Up), ScrollOutcome::Absorbed]);
}

#[test]
fn a_slow_deliberate_arrow_keypress_passes_through_as_a_real_arrow() {
    let mut decoder = InputDecoder::new();
    let mut scroll = ScrollDetector::new();

    let first = decode_all(&mut decoder, b"\x1b[B");
    assert_eq!(first, vec![InputAction::CursorDown]);
    assert_eq!(scroll.process_arrow(1000, ScrollDirection::Down), ScrollOutcome::None);

    let second = decode_all(&mut decoder, b"\x1b[B");
    assert_eq!(second, vec![InputAction::CursorDown]);
    assert_eq!(
        scroll.process_arrow(1200, ScrollDirection::Down),
        ScrollOutcome::Arrow(ScrollDirection::Down)
    );
}

#[test]
fn typing_text_between_arrow_keys_flushes_any_pending_scroll_state() {
    let mut decoder = InputDecoder::new();
    let mut scroll = ScrollDetector::new();

    decode_all(&mut decoder, b"\x1b[A");
    assert_eq!(scroll.process_arrow(1000, ScrollDirection::Up), ScrollOutcome::None);

    let typed = decode_all(&mut decoder, b"x");
    assert_eq!(typed, vec![InputAction::Char('x')]);
    assert_eq!(scroll.flush(), ScrollOutcome::Arrow(ScrollDirection::Up));
}
