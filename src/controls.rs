//! Key bindings: normal and vim-style.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CursorLeft,
    CursorRight,
    CursorUp,
    CursorDown,
    /// Tap the tile under the keyboard cursor.
    Select,
    Pause,
    Restart,
    Quit,
    None,
}

/// Map key event to board action. Supports both normal (arrows, space) and vim (hjkl).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('c') if modifiers == KeyModifiers::CONTROL => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('p') if no_mod => Action::Pause,
        KeyCode::Char('r') if no_mod => Action::Restart,
        KeyCode::Left | KeyCode::Char('h') if no_mod => Action::CursorLeft,
        KeyCode::Right | KeyCode::Char('l') if no_mod => Action::CursorRight,
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::CursorUp,
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::CursorDown,
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Select,
        _ => Action::None,
    }
}
