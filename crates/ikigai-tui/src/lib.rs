//! Scroll detector (C1), input decoder (C2), event loop (C6), framebuffer
//! serializer, and terminal lifecycle (spec §4.1, §4.2, §4.6, §4.7).

pub mod debug_pipe;
pub mod decoder;
pub mod event_loop;
pub mod framebuffer;
pub mod renderer;
pub mod scroll;
pub mod terminal;

pub use debug_pipe::{DebugLine, DebugManager};
pub use decoder::{Direction as KeyDirection, InputAction, InputDecoder};
pub use event_loop::EventLoop;
pub use framebuffer::{Framebuffer, serialize as serialize_framebuffer};
pub use scroll::{Clock, Direction as ScrollDirection, ScrollDetector, ScrollOutcome, SystemClock};
pub use terminal::{Tui, init_terminal, install_panic_hook, restore_terminal};
