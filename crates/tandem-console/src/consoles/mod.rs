mod canvas;
mod debug;
mod terminal;

pub use canvas::CanvasConsole;
pub use debug::DebugConsole;
pub use terminal::{Cell, TerminalConsole, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};

/// Character for a code point received from native code. `0` is dropped and
/// anything that is not a Unicode scalar value becomes U+FFFD.
pub(crate) fn char_from_code(code: u32) -> Option<char> {
    if code == 0 {
        return None;
    }
    Some(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
}
