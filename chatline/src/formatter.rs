//! ANSI formatter for the chat shell.
//!
//! Converts log entries and the input line (with its ghost hint) into escape
//! sequences for a raw-mode terminal. Lines end in `\r\n` because output
//! post-processing is off in raw mode.

use crate::classifier::Category;
use crate::event_log::LoggedEntry;

/// ANSI color codes for consistent styling.
mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const BLUE: &str = "\x1b[34m";
    pub const GRAY: &str = "\x1b[90m";
    pub const CLEAR_LINE: &str = "\r\x1b[2K";
}

/// Prompt shown before the input text.
pub const PROMPT: &str = "> ";

fn category_style(category: Category) -> &'static str {
    match category {
        Category::System => ansi::CYAN,
        Category::Error => ansi::RED,
        Category::Info => ansi::BLUE,
        Category::Chat => ansi::GREEN,
        Category::SelfMessage => ansi::GRAY,
        Category::Plain => "",
    }
}

/// Format one log entry as a full terminal line.
///
/// Own messages are right-aligned within `width` columns, the way the chat
/// window shows them on the opposite side.
pub fn format_entry(logged: &LoggedEntry, show_timestamps: bool, width: usize) -> String {
    let entry = &logged.entry;
    let stamp = if show_timestamps {
        format!("{}{}{} ", ansi::DIM, logged.timestamp(), ansi::RESET)
    } else {
        String::new()
    };
    let style = category_style(entry.category());

    let mut line = String::from(ansi::CLEAR_LINE);
    if entry.category() == Category::SelfMessage {
        let visible = entry.text().chars().count()
            + if show_timestamps { logged.timestamp().len() + 1 } else { 0 };
        line.push_str(&" ".repeat(width.saturating_sub(visible)));
    }
    line.push_str(&stamp);
    if entry.category() == Category::Error {
        line.push_str(ansi::BOLD);
    }
    line.push_str(style);
    line.push_str(entry.text());
    line.push_str(ansi::RESET);
    line.push_str("\r\n");
    line
}

/// Format the input line: prompt, typed text, dim ghost remainder, then move
/// the cursor back to `cursor` (a char index into `text`).
pub fn format_input_line(text: &str, ghost: Option<&str>, cursor: usize) -> String {
    let ghost = ghost.unwrap_or("");
    let back = ghost.chars().count() + text.chars().count().saturating_sub(cursor);
    let mut line = format!(
        "{}{}{}{}{}{}{}",
        ansi::CLEAR_LINE,
        ansi::YELLOW,
        PROMPT,
        ansi::RESET,
        text,
        ansi::DIM,
        ghost,
    );
    line.push_str(ansi::RESET);
    if back > 0 {
        line.push_str(&format!("\x1b[{back}D"));
    }
    line
}

/// Banner printed once the session is established.
pub fn format_banner(username: &str) -> String {
    format!(
        "{}{}chatline{} conectado como {}{}{}\r\n{}Comandos: list, sessions, chat:<user>, file:<path>, accept, deny, stop, exit  (Tab completa, → acepta){}\r\n",
        ansi::CYAN,
        ansi::BOLD,
        ansi::RESET,
        ansi::BOLD,
        username,
        ansi::RESET,
        ansi::DIM,
        ansi::RESET,
    )
}

/// Format a login failure for display before raw mode is entered.
pub fn format_login_error(message: &str) -> String {
    format!("{}{}Error:{} {}", ansi::RED, ansi::BOLD, ansi::RESET, message)
}
