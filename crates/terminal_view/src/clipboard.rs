use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Written into the widget after a selection was copied.
pub const COPY_CONFIRMATION: &str = "\x1b[32m✓\x1b[0m";

static SGR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// Remove SGR color sequences from copied text.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    SGR_PATTERN.replace_all(text, "")
}
