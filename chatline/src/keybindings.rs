//! Key bindings for the chat input line.
//!
//! | Key | Action |
//! |-----|--------|
//! | `Tab` | Cycle suggestions, or accept the only one |
//! | `→` | Accept the suggestion when the cursor is at the end, else move |
//! | `Enter` | Submit the line |
//! | `←` / `Home` / `End` (`Ctrl+A` / `Ctrl+E`) | Move the cursor |
//! | `Backspace` / `Delete` | Edit |
//! | `Ctrl+U` | Clear the line |
//! | `Ctrl+C` / `Ctrl+D` | Leave the shell |

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// An editing or control action on the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Insert(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Tab,
    Enter,
    ClearLine,
    Quit,
}

/// Map a terminal key event to an action. Key releases and unbound keys
/// map to `None`.
pub fn key_action(event: &KeyEvent) -> Option<KeyAction> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let action = match event.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => KeyAction::Quit,
        KeyCode::Char('u') if ctrl => KeyAction::ClearLine,
        KeyCode::Char('a') if ctrl => KeyAction::Home,
        KeyCode::Char('e') if ctrl => KeyAction::End,
        KeyCode::Char(_) if ctrl => return None,
        KeyCode::Char(c) => KeyAction::Insert(c),
        KeyCode::Backspace => KeyAction::Backspace,
        KeyCode::Delete => KeyAction::Delete,
        KeyCode::Left => KeyAction::Left,
        KeyCode::Right => KeyAction::Right,
        KeyCode::Home => KeyAction::Home,
        KeyCode::End => KeyAction::End,
        KeyCode::Tab => KeyAction::Tab,
        KeyCode::Enter => KeyAction::Enter,
        _ => return None,
    };
    Some(action)
}
