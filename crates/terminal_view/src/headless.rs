//! Emulator widget backed by alacritty_terminal, without a renderer.

use crate::{Container, TerminalWidget, WidgetFactory};
use alacritty_terminal::event::{Event, EventListener, WindowSize};
use alacritty_terminal::grid::{Dimensions, Scroll};
use alacritty_terminal::index::{Column, Line, Point, Side};
use alacritty_terminal::selection::{Selection, SelectionType};
use alacritty_terminal::term::cell::Flags as CellFlags;
use alacritty_terminal::term::{Config, Term, TermMode};
use alacritty_terminal::vte::ansi::{Processor, Rgb};
use parking_lot::Mutex;
use settings::constants::terminal::{CELL_HEIGHT, CELL_WIDTH, DEFAULT_COLS, DEFAULT_ROWS};
use std::sync::Arc;
use terminal::SessionId;

/// Wipes scrollback, homes the cursor and clears the screen.
const CLEAR_SEQUENCE: &[u8] = b"\x1b[3J\x1b[H\x1b[2J";

/// Terminal size in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.rows as usize
    }

    fn screen_lines(&self) -> usize {
        self.rows as usize
    }

    fn columns(&self) -> usize {
        self.cols as usize
    }
}

/// Collects what the emulator wants written back to the shell.
#[derive(Clone, Default)]
struct Listener {
    replies: Arc<Mutex<Vec<u8>>>,
    title: Arc<Mutex<Option<String>>>,
    size: Arc<Mutex<TermSize>>,
}

impl Listener {
    fn reply(&self, data: &[u8]) {
        self.replies.lock().extend_from_slice(data);
    }
}

impl EventListener for Listener {
    fn send_event(&self, event: Event) {
        match event {
            Event::Title(title) => *self.title.lock() = Some(title),
            Event::ResetTitle => *self.title.lock() = None,
            Event::PtyWrite(text) => self.reply(text.as_bytes()),
            Event::ColorRequest(_index, formatter) => {
                // Dark background so TUI apps pick their dark palette.
                let response = formatter(Rgb { r: 0, g: 0, b: 0 });
                self.reply(response.as_bytes());
            }
            Event::TextAreaSizeRequest(formatter) => {
                let size = *self.size.lock();
                let response = formatter(WindowSize {
                    num_lines: size.rows,
                    num_cols: size.cols,
                    cell_width: CELL_WIDTH as u16,
                    cell_height: CELL_HEIGHT as u16,
                });
                self.reply(response.as_bytes());
            }
            _ => {}
        }
    }
}

/// Emulator state for one session.
///
/// Lone `\n` is displayed as `\r\n`, matching how the desktop widget was
/// configured, so plain program output starts each line at column 0.
pub struct HeadlessTerminal {
    term: Term<Listener>,
    processor: Processor,
    listener: Listener,
    size: TermSize,
    focused: bool,
    stdin_enabled: bool,
    text_selection: bool,
    last_was_cr: bool,
}

impl HeadlessTerminal {
    pub fn new(scrollback_lines: usize) -> Self {
        let size = TermSize::default();
        let listener = Listener::default();
        *listener.size.lock() = size;
        let config = Config {
            scrolling_history: scrollback_lines,
            ..Config::default()
        };
        let term = Term::new(config, &size, listener.clone());

        Self {
            term,
            processor: Processor::new(),
            listener,
            size,
            focused: false,
            stdin_enabled: true,
            text_selection: false,
            last_was_cr: false,
        }
    }

    /// Window title set by the running program, if any.
    pub fn title(&self) -> Option<String> {
        self.listener.title.lock().clone()
    }

    fn convert_eol(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 16);
        for &byte in bytes {
            if byte == b'\n' && !self.last_was_cr {
                out.push(b'\r');
            }
            out.push(byte);
            self.last_was_cr = byte == b'\r';
        }
        out
    }

    fn row_text(&self, line: i32) -> String {
        let grid = self.term.grid();
        let row = &grid[Line(line)];
        let mut text = String::with_capacity(grid.columns());
        for col in 0..grid.columns() {
            let cell = &row[Column(col)];
            if cell.flags.contains(CellFlags::WIDE_CHAR_SPACER) {
                continue;
            }
            text.push(cell.c);
        }
        text.trim_end().to_string()
    }
}

impl TerminalWidget for HeadlessTerminal {
    fn write_display(&mut self, bytes: &[u8]) {
        let bytes = self.convert_eol(bytes);
        self.processor.advance(&mut self.term, &bytes);
    }

    fn fit(&mut self, container: Container) -> Option<(u16, u16)> {
        let (cols, rows) = container.grid()?;
        let size = TermSize { cols, rows };
        if size == self.size {
            return None;
        }
        self.term.resize(size);
        self.size = size;
        *self.listener.size.lock() = size;
        Some((cols, rows))
    }

    fn size(&self) -> (u16, u16) {
        (self.size.cols, self.size.rows)
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn set_stdin_enabled(&mut self, enabled: bool) {
        self.stdin_enabled = enabled;
    }

    fn stdin_enabled(&self) -> bool {
        self.stdin_enabled
    }

    fn set_text_selection(&mut self, enabled: bool) {
        self.text_selection = enabled;
        if !enabled {
            self.term.selection = None;
        }
    }

    fn text_selection_enabled(&self) -> bool {
        self.text_selection
    }

    fn selection(&self) -> Option<String> {
        self.term
            .selection_to_string()
            .filter(|text| !text.trim().is_empty())
    }

    /// Select scrollback and screen, top-left to bottom-right.
    fn select_all(&mut self) {
        let cols = self.term.columns();
        let start = Point::new(self.term.topmost_line(), Column(0));
        let end = Point::new(self.term.bottommost_line(), Column(cols.saturating_sub(1)));

        let mut selection = Selection::new(SelectionType::Simple, start, Side::Left);
        selection.update(end, Side::Right);
        self.term.selection = Some(selection);
        self.term.scroll_display(Scroll::Bottom);
    }

    fn clear_selection(&mut self) {
        self.term.selection = None;
    }

    fn clear(&mut self) {
        self.term.selection = None;
        self.processor.advance(&mut self.term, CLEAR_SEQUENCE);
    }

    fn screen_text(&self) -> String {
        let top = self.term.topmost_line().0;
        let bottom = self.term.bottommost_line().0;
        let mut lines: Vec<String> = (top..=bottom).map(|line| self.row_text(line)).collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }

    fn bracketed_paste(&self) -> bool {
        self.term.mode().contains(TermMode::BRACKETED_PASTE)
    }

    fn app_cursor(&self) -> bool {
        self.term.mode().contains(TermMode::APP_CURSOR)
    }

    fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut *self.listener.replies.lock())
    }
}

/// Builds [`HeadlessTerminal`]s with the configured scrollback.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessFactory {
    scrollback_lines: usize,
}

impl HeadlessFactory {
    pub fn new(scrollback_lines: usize) -> Self {
        Self { scrollback_lines }
    }
}

impl WidgetFactory for HeadlessFactory {
    fn create(&self, id: &SessionId) -> Box<dyn TerminalWidget> {
        tracing::debug!(session = %id, "Creating terminal widget");
        Box::new(HeadlessTerminal::new(self.scrollback_lines))
    }
}
