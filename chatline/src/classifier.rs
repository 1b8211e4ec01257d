//! Event line classifier.
//!
//! The chat server (and the local client) describe events as plain strings
//! with bracketed tags: `[SISTEMA] Chat con Ana ESTABLECIDO.`,
//! `[Ana] dice: hola`, `[YO] hola`. This module turns such lines into
//! categorized [`LogEntry`] values for display, and recognizes roster pushes
//! (`USERS_UPDATE:Ana,Bob`) that refresh the [`Vocabulary`] instead.
//!
//! ## Design
//!
//! The tag set is a wire contract with the message source and lives in a
//! single table, [`CATEGORY_RULES`], evaluated top to bottom. Tags are not
//! mutually exclusive (`[ERROR] x ] dice: y` carries two), so the table
//! order is the precedence.

use crate::vocabulary::Vocabulary;
use std::fmt;

/// Prefix of a roster push; the rest of the line is a comma-separated list.
pub const ROSTER_MARKER: &str = "USERS_UPDATE:";

/// Display category of an event line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Connection and session lifecycle, chat requests.
    System,
    /// Failures reported by the server or the client.
    Error,
    /// Informational notices.
    Info,
    /// A message from another user.
    Chat,
    /// Echo of a message the local user sent.
    SelfMessage,
    /// Anything without a recognized tag.
    Plain,
}

impl Category {
    /// Stable lower-case name, used for styling keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Error => "error",
            Category::Info => "info",
            Category::Chat => "chat",
            Category::SelfMessage => "self",
            Category::Plain => "plain",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized, immutable display record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    text: String,
    category: Category,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, category: Category) -> Self {
        Self {
            text: text.into(),
            category,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> Category {
        self.category
    }
}

/// What a raw event line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierOutcome {
    /// The connected-user list changed; no log entry is produced.
    RosterUpdate(Vec<String>),
    /// A line to append to the visible log.
    Entry(LogEntry),
}

/// How a tag is located in a line.
#[derive(Debug, Clone, Copy)]
pub enum TagMatch {
    Contains(&'static str),
    StartsWith(&'static str),
}

impl TagMatch {
    fn matches(self, line: &str) -> bool {
        match self {
            TagMatch::Contains(tag) => line.contains(tag),
            TagMatch::StartsWith(tag) => line.starts_with(tag),
        }
    }
}

/// Category rules in precedence order; the first rule with any matching tag wins.
pub const CATEGORY_RULES: &[(Category, &[TagMatch])] = &[
    (
        Category::System,
        &[TagMatch::Contains("[SISTEMA]"), TagMatch::Contains("[SOLICITUD]")],
    ),
    (
        Category::Error,
        &[TagMatch::Contains("[ERROR]"), TagMatch::Contains("[!]")],
    ),
    (Category::Info, &[TagMatch::Contains("[INFO]")]),
    (Category::Chat, &[TagMatch::Contains("] dice:")]),
    (Category::SelfMessage, &[TagMatch::StartsWith("[YO]")]),
];

/// Pick the display category for a line.
pub fn categorize(line: &str) -> Category {
    CATEGORY_RULES
        .iter()
        .find(|(_, tags)| tags.iter().any(|tag| tag.matches(line)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Plain)
}

/// Classify a line without touching any state.
pub fn classify_line(raw_line: &str) -> ClassifierOutcome {
    if let Some(users) = raw_line.strip_prefix(ROSTER_MARKER) {
        return ClassifierOutcome::RosterUpdate(parse_roster(users));
    }
    ClassifierOutcome::Entry(LogEntry::new(raw_line, categorize(raw_line)))
}

/// Classify a line, applying roster updates to `vocabulary`.
pub fn classify(raw_line: &str, vocabulary: &mut Vocabulary) -> ClassifierOutcome {
    let outcome = classify_line(raw_line);
    if let ClassifierOutcome::RosterUpdate(users) = &outcome {
        vocabulary.replace_users(users.iter().cloned());
    }
    outcome
}

fn parse_roster(users: &str) -> Vec<String> {
    users
        .split(',')
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}
