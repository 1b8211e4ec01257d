//! Single-line input editor that keeps command suggestions in sync.
//!
//! Every text change recomputes the [`InputState`] from scratch; there is
//! no incremental matching and nothing stale survives an edit.
//!
//! ## Coordinate System
//!
//! `cursor` is a byte offset into `text`, always on a char boundary.

use crate::completions::{self, InputState};
use crate::vocabulary::Vocabulary;

/// Text being typed plus its suggestion state.
#[derive(Debug, Clone, Default)]
pub struct InputSession {
    text: String,
    cursor: usize,
    state: InputState,
}

impl InputSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cursor as a byte offset.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Cursor as a char index, for terminal column math.
    pub fn cursor_chars(&self) -> usize {
        self.text[..self.cursor].chars().count()
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn cursor_at_end(&self) -> bool {
        self.cursor == self.text.len()
    }

    /// Ghost remainder to draw after the typed text.
    pub fn ghost(&self) -> Option<String> {
        self.state.ghost_suffix()
    }

    // ─── Edit Operations ────────────────────────────────────────────────

    pub fn insert_char(&mut self, c: char, vocabulary: &Vocabulary) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
        self.recompute(vocabulary);
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self, vocabulary: &Vocabulary) {
        if self.cursor == 0 {
            return;
        }
        let idx = prev_char_boundary(&self.text, self.cursor);
        self.text.remove(idx);
        self.cursor = idx;
        self.recompute(vocabulary);
    }

    /// Delete the character under the cursor.
    pub fn delete(&mut self, vocabulary: &Vocabulary) {
        if self.cursor_at_end() {
            return;
        }
        self.text.remove(self.cursor);
        self.recompute(vocabulary);
    }

    /// Replace the whole text and put the cursor at the end.
    pub fn set_text(&mut self, text: impl Into<String>, vocabulary: &Vocabulary) {
        self.text = text.into();
        self.cursor = self.text.len();
        self.recompute(vocabulary);
    }

    /// Clear text and suggestions.
    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.state = InputState::cleared("");
    }

    // ─── Cursor Movement ────────────────────────────────────────────────

    pub fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor = prev_char_boundary(&self.text, self.cursor);
        }
    }

    pub fn move_right(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }

    // ─── Suggestions ────────────────────────────────────────────────────

    /// Tab: cycle through several matches or accept the only one.
    pub fn tab(&mut self, vocabulary: &Vocabulary) {
        let next = completions::cycle(&self.state, vocabulary);
        if next.raw_text() != self.text {
            self.text = next.raw_text().to_string();
            self.cursor = self.text.len();
        }
        self.state = next;
    }

    /// Right arrow: accept the selected candidate when the cursor is at the
    /// end of the text, otherwise move the cursor.
    pub fn right(&mut self, vocabulary: &Vocabulary) {
        if self.cursor_at_end() && self.state.selected().is_some() {
            let next = completions::accept(&self.state, vocabulary);
            self.text = next.raw_text().to_string();
            self.cursor = self.text.len();
            self.state = next;
        } else {
            self.move_right();
        }
    }

    /// Enter: take the trimmed line and reset. Empty lines are not submitted
    /// and leave the buffer untouched.
    pub fn submit(&mut self) -> Option<String> {
        let line = self.text.trim().to_string();
        if line.is_empty() {
            return None;
        }
        self.clear();
        Some(line)
    }

    fn recompute(&mut self, vocabulary: &Vocabulary) {
        self.state = completions::compute_suggestions(&self.text, vocabulary);
    }
}

/// Byte offset of the char that ends at `idx`.
fn prev_char_boundary(s: &str, idx: usize) -> usize {
    s[..idx]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}
