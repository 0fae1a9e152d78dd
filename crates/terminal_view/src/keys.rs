//! Keyboard input encoding.
//!
//! Named keys and modifiers are turned into the byte sequences an xterm
//! would send, using termwiz's encoder.

use termwiz::input::{KeyCode, KeyCodeEncodeModes, KeyboardEncoding, Modifiers as TermwizMods};

/// Modifier state of a key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyModifiers {
    pub control: bool,
    pub alt: bool,
    pub shift: bool,
    /// Cmd on macOS, Super/Win elsewhere.
    pub platform: bool,
}

impl KeyModifiers {
    pub const NONE: Self = Self {
        control: false,
        alt: false,
        shift: false,
        platform: false,
    };

    pub fn control() -> Self {
        Self {
            control: true,
            ..Self::NONE
        }
    }

    pub fn platform() -> Self {
        Self {
            platform: true,
            ..Self::NONE
        }
    }
}

/// A key press: a named key ("enter", "up", "f5") or a single character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub modifiers: KeyModifiers,
}

impl KeyInput {
    pub fn new(key: impl Into<String>, modifiers: KeyModifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    pub fn plain(key: impl Into<String>) -> Self {
        Self::new(key, KeyModifiers::NONE)
    }

    /// Clipboard shortcut this key press stands for, if any.
    ///
    /// Ctrl or Cmd with `c` / `v`, without Alt.
    pub fn shortcut(&self) -> Option<Shortcut> {
        let mods = self.modifiers;
        if !(mods.control || mods.platform) || mods.alt {
            return None;
        }
        match self.key.to_ascii_lowercase().as_str() {
            "c" => Some(Shortcut::Copy),
            "v" => Some(Shortcut::Paste),
            _ => None,
        }
    }
}

/// Clipboard shortcuts intercepted before keys reach the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Copy,
    Paste,
}

fn to_termwiz_mods(mods: KeyModifiers) -> TermwizMods {
    let mut tm = TermwizMods::NONE;
    if mods.shift {
        tm |= TermwizMods::SHIFT;
    }
    if mods.alt {
        tm |= TermwizMods::ALT;
    }
    if mods.control {
        tm |= TermwizMods::CTRL;
    }
    tm
}

fn to_termwiz_key(key: &str) -> Option<KeyCode> {
    match key {
        "up" => Some(KeyCode::UpArrow),
        "down" => Some(KeyCode::DownArrow),
        "left" => Some(KeyCode::LeftArrow),
        "right" => Some(KeyCode::RightArrow),

        "home" => Some(KeyCode::Home),
        "end" => Some(KeyCode::End),
        "pageup" => Some(KeyCode::PageUp),
        "pagedown" => Some(KeyCode::PageDown),
        "insert" => Some(KeyCode::Insert),
        "delete" => Some(KeyCode::Delete),

        "tab" => Some(KeyCode::Tab),
        "enter" => Some(KeyCode::Enter),
        "escape" => Some(KeyCode::Escape),
        "backspace" => Some(KeyCode::Backspace),
        "space" => Some(KeyCode::Char(' ')),

        f if f.len() > 1 && f.starts_with('f') => f[1..]
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=12).contains(n))
            .map(KeyCode::Function),

        k if k.chars().count() == 1 => k.chars().next().map(KeyCode::Char),

        _ => None,
    }
}

/// Encode a key press for the shell. `None` for keys with no encoding.
pub fn encode_key(input: &KeyInput, app_cursor: bool) -> Option<Vec<u8>> {
    let keycode = to_termwiz_key(&input.key)?;
    let mods = input.modifiers;

    // Alt+Arrow: readline word movement
    if mods.alt && !mods.control && !mods.shift {
        match input.key.as_str() {
            "left" => return Some(b"\x1bb".to_vec()),
            "right" => return Some(b"\x1bf".to_vec()),
            _ => {}
        }
    }

    let modes = KeyCodeEncodeModes {
        encoding: KeyboardEncoding::Xterm,
        application_cursor_keys: app_cursor,
        newline_mode: false,
        modify_other_keys: None,
    };

    match keycode.encode(to_termwiz_mods(mods), modes, true) {
        Ok(seq) if !seq.is_empty() => Some(seq.into_bytes()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(key = %input.key, "Key encoding failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("enter", b"\r" ; "enter")]
    #[test_case("a", b"a" ; "plain char")]
    #[test_case("tab", b"\t" ; "tab")]
    #[test_case("escape", b"\x1b" ; "escape")]
    #[test_case("up", b"\x1b[A" ; "up normal mode")]
    fn plain_keys(key: &str, expected: &[u8]) {
        assert_eq!(encode_key(&KeyInput::plain(key), false), Some(expected.to_vec()));
    }

    #[test]
    fn arrows_follow_application_cursor_mode() {
        assert_eq!(
            encode_key(&KeyInput::plain("up"), true),
            Some(b"\x1bOA".to_vec())
        );
    }

    #[test]
    fn ctrl_c_is_interrupt() {
        assert_eq!(
            encode_key(&KeyInput::new("c", KeyModifiers::control()), false),
            Some(vec![0x03])
        );
    }

    #[test]
    fn alt_arrows_move_by_word() {
        let alt = KeyModifiers {
            alt: true,
            ..KeyModifiers::NONE
        };
        assert_eq!(
            encode_key(&KeyInput::new("left", alt), false),
            Some(b"\x1bb".to_vec())
        );
    }

    #[test]
    fn unknown_key_has_no_encoding() {
        assert_eq!(encode_key(&KeyInput::plain("hyper"), false), None);
        assert_eq!(encode_key(&KeyInput::plain("f13"), false), None);
    }

    #[test_case(KeyInput::new("c", KeyModifiers::control()), Some(Shortcut::Copy) ; "ctrl c")]
    #[test_case(KeyInput::new("C", KeyModifiers::platform()), Some(Shortcut::Copy) ; "cmd c")]
    #[test_case(KeyInput::new("v", KeyModifiers::platform()), Some(Shortcut::Paste) ; "cmd v")]
    #[test_case(KeyInput::plain("c"), None ; "bare c")]
    #[test_case(KeyInput::new("x", KeyModifiers::control()), None ; "ctrl x")]
    fn shortcuts(input: KeyInput, expected: Option<Shortcut>) {
        assert_eq!(input.shortcut(), expected);
    }
}
