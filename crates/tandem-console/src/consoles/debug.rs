use super::char_from_code;
use crate::console::Console;
use crate::error::ConsoleError;
use crate::frame::ConsoleCall;
use crate::method::ConsoleClass;
use crate::props::{ConsoleProps, IoTypes};
use std::any::Any;
use tandem_mem::Memory;
use tracing::info;

/// Lines longer than this are emitted in pieces.
const MAX_LINE_CHARS: usize = 300;

/// Write-only console that emits whole lines through `tracing`.
#[derive(Debug, Default)]
pub struct DebugConsole {
    line: String,
    line_chars: usize,
}

impl DebugConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text received since the last emitted line.
    pub fn pending_line(&self) -> &str {
        &self.line
    }

    pub fn char_out(&mut self, ch: char) {
        if ch == '\n' {
            self.flush_line();
            return;
        }
        self.line.push(ch);
        self.line_chars += 1;
        if self.line_chars >= MAX_LINE_CHARS {
            self.flush_line();
        }
    }

    pub fn put_str(&mut self, text: &str) {
        text.chars().for_each(|ch| self.char_out(ch));
    }

    fn flush_line(&mut self) {
        info!("{}", self.line);
        self.line.clear();
        self.line_chars = 0;
    }
}

impl Console for DebugConsole {
    fn class(&self) -> ConsoleClass {
        ConsoleClass::Debug
    }

    fn props(&self) -> ConsoleProps {
        ConsoleProps::new(IoTypes::CHARWRITE)
    }

    fn handle(&mut self, call: ConsoleCall, _mem: &mut dyn Memory) -> Result<u32, ConsoleError> {
        match call {
            ConsoleCall::CharOut { ch, .. } => {
                if let Some(ch) = char_from_code(ch) {
                    self.char_out(ch);
                }
            }
            ConsoleCall::PutStr { text, .. } => self.put_str(&text),
            other => {
                return Err(ConsoleError::NotHandled {
                    class: self.class(),
                    method: other.method(),
                })
            }
        }
        Ok(0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_flushes_the_pending_line() {
        let mut con = DebugConsole::new();
        con.put_str("abc");
        assert_eq!(con.pending_line(), "abc");
        con.put_str("d\nef");
        assert_eq!(con.pending_line(), "ef");
    }

    #[test]
    fn long_lines_are_split() {
        let mut con = DebugConsole::new();
        con.put_str(&"é".repeat(MAX_LINE_CHARS - 1));
        assert_eq!(con.pending_line().chars().count(), MAX_LINE_CHARS - 1);
        con.char_out('x');
        assert_eq!(con.pending_line(), "");
    }
}
