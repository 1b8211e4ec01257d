//! Prefix completion engine with ghost text support.
//!
//! Two command shapes are completed:
//! - **Base commands**: `li` → `list`, `s` → `sessions` / `stop`
//! - **User arguments**: `chat:an` → `chat:Ana`, `stop:b` → `stop:Bob`
//!
//! Matching is case-insensitive; rendering keeps the casing the user typed
//! for the prefix and the vocabulary's casing for the remainder. The selected
//! candidate is rendered as dim "ghost text" after the cursor.
//!
//! Everything here is a pure function of `(text, vocabulary)`; the caller
//! owns the returned [`InputState`] and replaces it on every keystroke.

use crate::vocabulary::{Vocabulary, USER_ARGUMENT_COMMANDS};

/// Separates a command from its argument (`chat:Bob`).
pub const SEGMENT_DELIMITER: char = ':';

/// Suggestion state for the current input text.
///
/// `selected` is `Some` exactly when `matches` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    raw_text: String,
    matches: Vec<String>,
    selected: Option<usize>,
}

/// The text displayed in the hint layer: typed prefix plus the remainder
/// of the selected candidate, or empty when nothing should be shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintRecord {
    pub visible_text: String,
}

impl InputState {
    /// State with no matches for `raw_text`.
    pub fn cleared(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            matches: Vec::new(),
            selected: None,
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Candidates in vocabulary order.
    pub fn matches(&self) -> &[String] {
        &self.matches
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// The currently selected candidate, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected
            .and_then(|idx| self.matches.get(idx))
            .map(String::as_str)
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Hint for the selected candidate.
    pub fn hint(&self) -> HintRecord {
        HintRecord {
            visible_text: self
                .selected()
                .map(|candidate| render_hint(&self.raw_text, candidate))
                .unwrap_or_default(),
        }
    }

    /// Only the part of the hint after what the user typed.
    ///
    /// Returns `None` when there is no hint or it adds nothing.
    pub fn ghost_suffix(&self) -> Option<String> {
        let hint = self.hint();
        hint.visible_text
            .strip_prefix(self.raw_text.as_str())
            .filter(|suffix| !suffix.is_empty())
            .map(str::to_string)
    }
}

/// Compute the candidate set for `raw_text`.
///
/// With a `:` present only the first one is significant: the head selects
/// the command and everything after it (further colons included) is the
/// user prefix, reproduced verbatim in the candidate.
pub fn compute_suggestions(raw_text: &str, vocabulary: &Vocabulary) -> InputState {
    if raw_text.is_empty() {
        return InputState::cleared("");
    }

    let matches = match raw_text.split_once(SEGMENT_DELIMITER) {
        Some((head, tail)) => user_argument_matches(head, tail, vocabulary),
        None => base_command_matches(raw_text, vocabulary),
    };

    if matches.is_empty() {
        return InputState::cleared(raw_text);
    }

    InputState {
        raw_text: raw_text.to_string(),
        matches,
        selected: Some(0),
    }
}

/// Render the hint for `candidate` given what the user typed.
///
/// `render_hint("CH", "chat")` is `"CHat"`; a candidate that does not start
/// with `raw_text` (ignoring case) renders as an empty string.
pub fn render_hint(raw_text: &str, candidate: &str) -> String {
    match prefix_end_ignore_case(candidate, raw_text) {
        Some(end) => format!("{raw_text}{}", &candidate[end..]),
        None => String::new(),
    }
}

/// Tab behaviour.
///
/// Several matches: advance the selection, wrapping around. A single match:
/// accept it. No matches: unchanged.
pub fn cycle(state: &InputState, vocabulary: &Vocabulary) -> InputState {
    match state.matches.len() {
        0 => state.clone(),
        1 => accept(state, vocabulary),
        len => {
            let next = state.selected.map(|idx| (idx + 1) % len).unwrap_or(0);
            InputState {
                selected: Some(next),
                ..state.clone()
            }
        }
    }
}

/// Replace the input with the selected candidate and recompute from scratch.
pub fn accept(state: &InputState, vocabulary: &Vocabulary) -> InputState {
    match state.selected() {
        Some(candidate) => compute_suggestions(candidate, vocabulary),
        None => state.clone(),
    }
}

fn base_command_matches(raw_text: &str, vocabulary: &Vocabulary) -> Vec<String> {
    let lowered = raw_text.to_lowercase();
    vocabulary
        .base_commands()
        .iter()
        .filter(|cmd| cmd.starts_with(&lowered))
        .map(|cmd| cmd.to_string())
        .collect()
}

fn user_argument_matches(head: &str, tail: &str, vocabulary: &Vocabulary) -> Vec<String> {
    let command = head.to_lowercase();
    if !USER_ARGUMENT_COMMANDS.contains(&command.as_str()) {
        return Vec::new();
    }
    vocabulary
        .known_users()
        .iter()
        .filter(|user| prefix_end_ignore_case(user, tail).is_some())
        .map(|user| format!("{head}{SEGMENT_DELIMITER}{user}"))
        .collect()
}

/// If `text` starts with `prefix` ignoring case, the byte offset in `text`
/// where the matched prefix ends.
///
/// Characters are compared one by one on their lower-case forms so the
/// offset always lands on a char boundary of `text`.
fn prefix_end_ignore_case(text: &str, prefix: &str) -> Option<usize> {
    let mut text_chars = text.char_indices();
    for p in prefix.chars() {
        let (_, t) = text_chars.next()?;
        if !t.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    Some(text_chars.next().map(|(idx, _)| idx).unwrap_or(text.len()))
}
