//! Terminal viewport that renders streamed log text.
//!
//! Rendering is delegated to a `vt100` parser, so colour codes, carriage
//! return rewrites and soft wrap behave the way they do in a real terminal.
//! The raw text is kept alongside for `contents()`, the output tap and for
//! replaying into a fresh parser when the viewport is resized.

use tokio::sync::mpsc;

use crate::errors::TerminalError;

pub const DEFAULT_FONT_SIZE: u8 = 12;
pub const MIN_FONT_SIZE: u8 = 6;
pub const MAX_FONT_SIZE: u8 = 32;
const FONT_STEP: u8 = 2;

/// Rows kept above the screen for scrolling back.
pub const SCROLLBACK_ROWS: usize = 10_000;

/// Viewports narrower than this suggest rotating the device.
pub const ROTATE_HINT_MIN_COLS: u16 = 80;

pub struct TerminalBuffer {
    parser: vt100::Parser,
    text: String,
    font_size: u8,
    disposed: bool,
    tap: Option<mpsc::UnboundedSender<String>>,
}

impl std::fmt::Debug for TerminalBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalBuffer")
            .field("size", &self.size())
            .field("text_len", &self.text.len())
            .field("font_size", &self.font_size)
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Log text uses bare `\n`; the emulator needs `\r\n` to return to column 0.
fn convert_eol(text: &str) -> String {
    text.replace('\n', "\r\n")
}

fn check_size(cols: u16, rows: u16) -> Result<(), TerminalError> {
    if cols == 0 || rows == 0 {
        Err(TerminalError::InvalidSize { cols, rows })
    } else {
        Ok(())
    }
}

impl TerminalBuffer {
    pub fn new(cols: u16, rows: u16) -> Result<Self, TerminalError> {
        check_size(cols, rows)?;
        Ok(Self {
            parser: vt100::Parser::new(rows, cols, SCROLLBACK_ROWS),
            text: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            disposed: false,
            tap: None,
        })
    }

    fn ensure_live(&self) -> Result<(), TerminalError> {
        if self.disposed {
            Err(TerminalError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Append text. Order of writes is display order.
    pub fn write(&mut self, text: &str) -> Result<(), TerminalError> {
        self.ensure_live()?;
        if text.is_empty() {
            return Ok(());
        }
        self.text.push_str(text);
        self.parser.process(convert_eol(text).as_bytes());
        let tap_closed = self
            .tap
            .as_ref()
            .is_some_and(|tap| tap.send(text.to_string()).is_err());
        if tap_closed {
            self.tap = None;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), TerminalError> {
        self.ensure_live()?;
        let (cols, rows) = self.size();
        self.text.clear();
        self.parser = vt100::Parser::new(rows, cols, SCROLLBACK_ROWS);
        Ok(())
    }

    /// Release the buffer. Every later write fails with `Disposed`.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.text = String::new();
        self.parser = vt100::Parser::new(1, 1, 0);
        self.tap = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Mirror every subsequent write to the returned receiver.
    pub fn tap(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tap = Some(tx);
        rx
    }

    /// Raw text written since the last clear, escape sequences included.
    pub fn contents(&self) -> &str {
        &self.text
    }

    /// Viewport size as `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        let (rows, cols) = self.parser.screen().size();
        (cols, rows)
    }

    /// Resize and re-render, so wrapped lines reflow to the new width.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), TerminalError> {
        self.ensure_live()?;
        check_size(cols, rows)?;
        let offset = self.scroll_offset();
        let mut parser = vt100::Parser::new(rows, cols, SCROLLBACK_ROWS);
        parser.process(convert_eol(&self.text).as_bytes());
        parser.screen_mut().set_scrollback(offset);
        self.parser = parser;
        Ok(())
    }

    /// The rendered rows inside the viewport, without trailing blanks.
    pub fn visible_lines(&self) -> Vec<String> {
        let screen = self.parser.screen();
        let (_, cols) = screen.size();
        screen
            .rows(0, cols)
            .map(|row| row.trim_end().to_string())
            .collect()
    }

    /// Rendered viewport with colour attributes, one escape-coded row each.
    pub fn visible_rows_formatted(&self) -> Vec<Vec<u8>> {
        let screen = self.parser.screen();
        let (_, cols) = screen.size();
        screen.rows_formatted(0, cols).collect()
    }

    /// How many rows the view sits above the newest output.
    pub fn scroll_offset(&self) -> usize {
        self.parser.screen().scrollback()
    }

    /// Rows available above the screen.
    pub fn scrollback_rows(&mut self) -> usize {
        let screen = self.parser.screen_mut();
        let previous = screen.scrollback();
        screen.set_scrollback(usize::MAX);
        let max = screen.scrollback();
        screen.set_scrollback(previous);
        max
    }

    /// True while the view is pinned to the newest output.
    pub fn is_following(&self) -> bool {
        self.scroll_offset() == 0
    }

    pub fn scroll_to_top(&mut self) {
        self.parser.screen_mut().set_scrollback(usize::MAX);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.parser.screen_mut().set_scrollback(0);
    }

    /// Scroll by `delta` rows; negative scrolls up into the scrollback.
    pub fn scroll_by(&mut self, delta: isize) {
        let offset = self.scroll_offset();
        let target = if delta < 0 {
            offset.saturating_add(delta.unsigned_abs())
        } else {
            offset.saturating_sub(delta.unsigned_abs())
        };
        self.parser.screen_mut().set_scrollback(target);
    }

    pub fn font_size(&self) -> u8 {
        self.font_size
    }

    pub fn zoom_in(&mut self) -> u8 {
        self.font_size = (self.font_size + FONT_STEP).min(MAX_FONT_SIZE);
        self.font_size
    }

    pub fn zoom_out(&mut self) -> u8 {
        self.font_size = self
            .font_size
            .saturating_sub(FONT_STEP)
            .max(MIN_FONT_SIZE);
        self.font_size
    }

    pub fn set_font_size(&mut self, size: u8) -> u8 {
        self.font_size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self.font_size
    }

    pub fn reset_zoom(&mut self) -> u8 {
        self.set_font_size(DEFAULT_FONT_SIZE)
    }
}
