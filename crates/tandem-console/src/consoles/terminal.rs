//! Character-cell terminal with addressable cells and 2x3 block graphics.
//!
//! Cells hold code points plus an RGB foreground and background. Cell values
//! `0x80..=0xBF` are block graphics: the low six bits light the sub-pixels of
//! a 2-wide by 3-high grid, bit `row * 2 + column`.

use super::char_from_code;
use crate::console::Console;
use crate::error::ConsoleError;
use crate::frame::ConsoleCall;
use crate::method::ConsoleClass;
use crate::props::{ConsoleProps, IoTypes};
use std::any::Any;
use tandem_mem::Memory;
use tracing::trace;

pub const DEFAULT_FOREGROUND: u32 = 0xFF_FFFF;
pub const DEFAULT_BACKGROUND: u32 = 0x00_0000;

const BLANK: u32 = ' ' as u32;
const GRAPHIC_BASE: u32 = 0x80;
const GRAPHIC_BITS: u32 = 0x3F;
const BLOCK_W: u32 = 2;
const BLOCK_H: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: u32,
    pub foreground: u32,
    pub background: u32,
}

impl Cell {
    fn is_graphic(&self) -> bool {
        (GRAPHIC_BASE..=GRAPHIC_BASE | GRAPHIC_BITS).contains(&self.ch)
    }
}

#[derive(Debug)]
pub struct TerminalConsole {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
    cursor: u32,
    foreground: u32,
    background: u32,
    focused: bool,
}

impl TerminalConsole {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "terminal must have at least one cell");
        let blank = Cell {
            ch: BLANK,
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
        };
        Self {
            width,
            height,
            cells: vec![blank; width as usize * height as usize],
            cursor: 0,
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
            focused: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn size(&self) -> u32 {
        self.width * self.height
    }

    /// Cursor position as a cell index (`y * width + x`).
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// `(foreground, background)` used for newly written cells.
    pub fn colors(&self) -> (u32, u32) {
        (self.foreground, self.background)
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.cells[(y * self.width + x) as usize])
    }

    /// Row `y` as text with trailing blanks removed.
    pub fn row_text(&self, y: u32) -> String {
        let start = (y * self.width) as usize;
        let row = &self.cells[start..start + self.width as usize];
        let text: String = row
            .iter()
            .map(|c| char_from_code(c.ch).unwrap_or(' '))
            .collect();
        text.trim_end().to_owned()
    }

    fn blank(&self) -> Cell {
        self.cell_with(BLANK)
    }

    fn cell_with(&self, ch: u32) -> Cell {
        Cell {
            ch,
            foreground: self.foreground,
            background: self.background,
        }
    }

    fn check_location(&self, location: u32, len: u32) -> Result<(), ConsoleError> {
        match location.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(ConsoleError::CellOutOfRange {
                location,
                size: self.size(),
            }),
        }
    }

    fn scroll(&mut self) {
        let w = self.width as usize;
        self.cells.copy_within(w.., 0);
        let blank = self.blank();
        let len = self.cells.len();
        self.cells[len - w..].fill(blank);
        self.cursor = self.size() - self.width;
        trace!("terminal scrolled");
    }

    pub fn char_out(&mut self, ch: char) {
        match ch {
            '\n' => {
                self.cursor = (self.cursor / self.width + 1) * self.width;
                if self.cursor >= self.size() {
                    self.scroll();
                }
            }
            '\r' => self.cursor -= self.cursor % self.width,
            '\u{8}' => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.cells[self.cursor as usize] = self.blank();
                }
            }
            '\u{c}' => self.cls(),
            ch => {
                self.cells[self.cursor as usize] = self.cell_with(ch as u32);
                self.cursor += 1;
                if self.cursor >= self.size() {
                    self.scroll();
                }
            }
        }
    }

    pub fn put_str(&mut self, text: &str) {
        text.chars().for_each(|ch| self.char_out(ch));
    }

    /// Store a raw cell value at `location` without moving the cursor.
    pub fn set_c32(&mut self, location: u32, ch: u32) -> Result<(), ConsoleError> {
        self.check_location(location, 1)?;
        self.cells[location as usize] = self.cell_with(ch);
        Ok(())
    }

    pub fn set_range(&mut self, start: u32, values: &[u32]) -> Result<(), ConsoleError> {
        self.check_location(start, values.len() as u32)?;
        for (i, &ch) in values.iter().enumerate() {
            self.cells[start as usize + i] = self.cell_with(ch);
        }
        Ok(())
    }

    pub fn set_cursor(&mut self, location: u32) -> Result<(), ConsoleError> {
        self.check_location(location, 1)?;
        self.cursor = location;
        Ok(())
    }

    pub fn set_colors(&mut self, foreground: u32, background: u32) {
        self.foreground = foreground;
        self.background = background;
    }

    pub fn cls(&mut self) {
        let blank = self.blank();
        self.cells.fill(blank);
        self.cursor = 0;
    }

    /// Cell index and bit for block pixel `(x, y)`.
    fn block(&self, x: u32, y: u32) -> Result<(usize, u32), ConsoleError> {
        let (width, height) = (self.width * BLOCK_W, self.height * BLOCK_H);
        if x >= width || y >= height {
            return Err(ConsoleError::PixelOutOfRange {
                x,
                y,
                width,
                height,
            });
        }
        let cell = (y / BLOCK_H) * self.width + x / BLOCK_W;
        let bit = 1 << ((y % BLOCK_H) * BLOCK_W + x % BLOCK_W);
        Ok((cell as usize, bit))
    }

    /// Light (`set`) or clear one block-graphics pixel. A cell that does not
    /// hold a graphic yet starts out with every pixel cleared.
    pub fn set_reset(&mut self, x: u32, y: u32, set: bool) -> Result<(), ConsoleError> {
        let (index, bit) = self.block(x, y)?;
        let cell = self.cells[index];
        let mut bits = if cell.is_graphic() {
            cell.ch & GRAPHIC_BITS
        } else {
            0
        };
        if set {
            bits |= bit;
        } else {
            bits &= !bit;
        }
        self.cells[index] = self.cell_with(GRAPHIC_BASE | bits);
        Ok(())
    }

    pub fn point(&self, x: u32, y: u32) -> Result<bool, ConsoleError> {
        let (index, bit) = self.block(x, y)?;
        let cell = self.cells[index];
        Ok(cell.is_graphic() && cell.ch & bit != 0)
    }
}

impl Console for TerminalConsole {
    fn class(&self) -> ConsoleClass {
        ConsoleClass::Terminal
    }

    fn props(&self) -> ConsoleProps {
        ConsoleProps::new(IoTypes::CHARREAD | IoTypes::CHARWRITE | IoTypes::ADDRESSABLE_DISPLAY)
            .with("widthInChars", self.width as i32)
            .with("heightInChars", self.height as i32)
            .with("foreColorAsRGB", self.foreground as i32)
            .with("backColorAsRGB", self.background as i32)
            .with("cursorPos", self.cursor as i32)
    }

    fn handle(&mut self, call: ConsoleCall, _mem: &mut dyn Memory) -> Result<u32, ConsoleError> {
        match call {
            ConsoleCall::CharOut { ch, .. } => {
                if let Some(ch) = char_from_code(ch) {
                    self.char_out(ch);
                }
            }
            ConsoleCall::PutStr { text, .. } => self.put_str(&text),
            ConsoleCall::SetRange { start, values } => self.set_range(start, &values)?,
            ConsoleCall::SetC32 { location, ch } => self.set_c32(location, ch)?,
            ConsoleCall::SetReset { x, y, set } => self.set_reset(x, y, set)?,
            ConsoleCall::SetCursor { location } => self.set_cursor(location)?,
            ConsoleCall::SetColors {
                foreground,
                background,
            } => self.set_colors(foreground, background),
            ConsoleCall::Cls => self.cls(),
            ConsoleCall::SetFocus => self.focused = true,
            ConsoleCall::Point { x, y } => return Ok(self.point(x, y)? as u32),
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
    fn control_characters() {
        let mut t = TerminalConsole::new(8, 3);
        t.put_str("abc\rX\nde\u{8}f");
        assert_eq!(t.row_text(0), "Xbc");
        assert_eq!(t.row_text(1), "df");
        assert_eq!(t.cursor(), 8 + 2);

        t.char_out('\u{c}');
        assert_eq!(t.row_text(0), "");
        assert_eq!(t.row_text(1), "");
        assert_eq!(t.cursor(), 0);
    }

    #[test]
    fn writing_past_the_end_scrolls() {
        let mut t = TerminalConsole::new(4, 2);
        t.put_str("one\ntwo\nsix");
        assert_eq!(t.row_text(0), "two");
        assert_eq!(t.row_text(1), "six");

        // Filling the last cell scrolls immediately.
        t.put_str("!");
        assert_eq!(t.row_text(0), "six!");
        assert_eq!(t.row_text(1), "");
        assert_eq!(t.cursor(), 4);
    }

    #[test]
    fn cells_take_current_colors() {
        let mut t = TerminalConsole::new(4, 2);
        t.set_colors(0x00FF00, 0x000080);
        t.set_c32(5, 'Z' as u32).unwrap();
        assert_eq!(
            t.cell(1, 1),
            Some(Cell {
                ch: 'Z' as u32,
                foreground: 0x00FF00,
                background: 0x000080
            })
        );
        assert_eq!(t.cursor(), 0);
        assert_eq!(
            t.set_range(6, &[1, 2, 3]),
            Err(ConsoleError::CellOutOfRange {
                location: 6,
                size: 8
            })
        );
        assert_eq!(
            t.set_cursor(8),
            Err(ConsoleError::CellOutOfRange {
                location: 8,
                size: 8
            })
        );
    }

    #[test]
    fn block_graphics() {
        let mut t = TerminalConsole::new(2, 2);
        // Pixel grid is 4x6; (3, 5) is the bottom-right pixel of cell (1, 1).
        t.set_reset(3, 5, true).unwrap();
        t.set_reset(0, 0, true).unwrap();
        t.set_reset(1, 0, true).unwrap();
        assert_eq!(t.cell(1, 1).unwrap().ch, 0x80 | 0b10_0000);
        assert_eq!(t.cell(0, 0).unwrap().ch, 0x80 | 0b11);
        assert!(t.point(3, 5).unwrap());
        assert!(!t.point(2, 5).unwrap());

        t.set_reset(0, 0, false).unwrap();
        assert_eq!(t.cell(0, 0).unwrap().ch, 0x80 | 0b10);
        assert!(!t.point(0, 0).unwrap());

        // Text cells read as unlit.
        t.set_c32(1, 'A' as u32).unwrap();
        assert!(!t.point(2, 0).unwrap());
        assert_eq!(
            t.point(4, 0),
            Err(ConsoleError::PixelOutOfRange {
                x: 4,
                y: 0,
                width: 4,
                height: 6
            })
        );
    }

    #[test]
    fn props_describe_the_grid() {
        let t = TerminalConsole::new(80, 25);
        let props = t.props();
        assert_eq!(
            props.io_types(),
            IoTypes::CHARREAD | IoTypes::CHARWRITE | IoTypes::ADDRESSABLE_DISPLAY
        );
        assert_eq!(props.get("widthInChars"), Some(80));
        assert_eq!(props.get("heightInChars"), Some(25));
        assert_eq!(props.get("foreColorAsRGB"), Some(0xFF_FFFF));
        assert_eq!(props.get("backColorAsRGB"), Some(0));
        assert_eq!(props.get("cursorPos"), Some(0));
    }
}
