use settings::constants::terminal::{CELL_HEIGHT, CELL_WIDTH};
use terminal::SessionId;

/// Pixel area a widget is laid out in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Container {
    pub width_px: f32,
    pub height_px: f32,
}

impl Container {
    pub fn new(width_px: f32, height_px: f32) -> Self {
        Self {
            width_px,
            height_px,
        }
    }

    /// Container sized to hold exactly `cols` x `rows` cells.
    pub fn for_grid(cols: u16, rows: u16) -> Self {
        // Half a cell of slack so float rounding never loses a column.
        Self {
            width_px: (cols as f32 + 0.5) * CELL_WIDTH,
            height_px: (rows as f32 + 0.5) * CELL_HEIGHT,
        }
    }

    /// Columns and rows that fit, or `None` for an unmounted (empty) area.
    pub fn grid(&self) -> Option<(u16, u16)> {
        if !(self.width_px.is_finite() && self.height_px.is_finite()) {
            return None;
        }
        let cols = (self.width_px / CELL_WIDTH).floor();
        let rows = (self.height_px / CELL_HEIGHT).floor();
        if cols < 2.0 || rows < 1.0 {
            return None;
        }
        Some((cols.min(u16::MAX as f32) as u16, rows.min(u16::MAX as f32) as u16))
    }
}

/// A terminal emulator surface.
///
/// Glyph rendering belongs to the implementation; the session layer only
/// feeds it bytes and drives focus, sizing and selection.
pub trait TerminalWidget: Send {
    /// Append shell output to the display.
    fn write_display(&mut self, bytes: &[u8]);

    /// Fit to `container`. Returns the new grid when it changed.
    fn fit(&mut self, container: Container) -> Option<(u16, u16)>;
    fn size(&self) -> (u16, u16);

    fn focus(&mut self);
    fn blur(&mut self);
    fn is_focused(&self) -> bool;

    /// Whether keystrokes may reach the shell.
    fn set_stdin_enabled(&mut self, enabled: bool);
    fn stdin_enabled(&self) -> bool;

    /// Whether mouse drags select text on the rendered surface.
    fn set_text_selection(&mut self, enabled: bool);
    fn text_selection_enabled(&self) -> bool;

    /// Selected text, `None` when nothing is selected.
    fn selection(&self) -> Option<String>;
    fn select_all(&mut self);
    fn clear_selection(&mut self);

    /// Wipe the screen and scrollback.
    fn clear(&mut self);

    /// Plain text of scrollback and screen, trailing blank lines dropped.
    fn screen_text(&self) -> String;

    /// Modes set by the running program.
    fn bracketed_paste(&self) -> bool;
    fn app_cursor(&self) -> bool;

    /// Responses to terminal queries (cursor position, colors) that must be
    /// written back to the shell.
    fn take_replies(&mut self) -> Vec<u8>;
}

/// Creates one widget per session.
pub trait WidgetFactory: Send + Sync {
    fn create(&self, id: &SessionId) -> Box<dyn TerminalWidget>;
}
