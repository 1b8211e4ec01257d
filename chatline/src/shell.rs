//! The interactive shell driver.
//!
//! [`Shell`] is the single actor that serializes keystrokes and inbound
//! event lines. It owns the vocabulary, the input line and the event log,
//! and reaches the server only through a [`Collaborator`].

use crate::classifier::{classify, ClassifierOutcome};
use crate::event_log::{EventLog, LoggedEntry};
use crate::input::InputSession;
use crate::keybindings::KeyAction;
use crate::transport::{Ack, Collaborator, Status};
use crate::vocabulary::Vocabulary;
use thiserror::Error;

/// Logged once the nickname is accepted.
pub const CONNECTED_LINE: &str = "[SISTEMA] Conectado exitosamente.";

/// What the caller should do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellSignal {
    Continue,
    Exit,
}

/// Connect or name registration failed; the message is shown as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LoginFailure(pub String);

pub struct Shell<C: Collaborator> {
    collaborator: C,
    vocabulary: Vocabulary,
    input: InputSession,
    log: EventLog,
    username: Option<String>,
    closed: bool,
}

impl<C: Collaborator> Shell<C> {
    pub fn new(collaborator: C) -> Self {
        Self {
            collaborator,
            vocabulary: Vocabulary::new(),
            input: InputSession::new(),
            log: EventLog::new(),
            username: None,
            closed: false,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn input(&self) -> &InputSession {
        &self.input
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Connect and register `nickname`. On success the roster is requested
    /// right away so completions have users to offer.
    pub fn login(&mut self, host: &str, port: u16, nickname: &str) -> Result<String, LoginFailure> {
        let reply = self.collaborator.connect(host, port);
        if reply.status == Status::Error {
            let message = reply
                .message
                .unwrap_or_else(|| "No se pudo conectar".to_string());
            return Err(LoginFailure(message));
        }

        let reply = self.collaborator.set_name(nickname);
        let username = match (reply.status, reply.username) {
            (Status::Success, Some(username)) => username,
            (Status::Success, None) => nickname.trim().to_string(),
            (Status::Error, _) => {
                self.collaborator.close_session();
                let message = reply.message.unwrap_or_else(|| "Nombre rechazado".to_string());
                return Err(LoginFailure(message));
            }
        };

        tracing::info!("logged in as {username}");
        self.username = Some(username.clone());
        self.closed = false;
        self.on_event(CONNECTED_LINE);
        self.collaborator.send_command("list");
        Ok(username)
    }

    /// Handle one key action.
    pub fn on_key(&mut self, action: KeyAction) -> ShellSignal {
        match action {
            KeyAction::Insert(c) => self.input.insert_char(c, &self.vocabulary),
            KeyAction::Backspace => self.input.backspace(&self.vocabulary),
            KeyAction::Delete => self.input.delete(&self.vocabulary),
            KeyAction::Left => self.input.move_left(),
            KeyAction::Right => self.input.right(&self.vocabulary),
            KeyAction::Home => self.input.move_home(),
            KeyAction::End => self.input.move_end(),
            KeyAction::Tab => self.input.tab(&self.vocabulary),
            KeyAction::ClearLine => self.input.clear(),
            KeyAction::Enter => {
                if let Some(line) = self.input.submit() {
                    return self.submit(&line);
                }
            }
            KeyAction::Quit => {
                self.close();
                return ShellSignal::Exit;
            }
        }
        ShellSignal::Continue
    }

    /// Send a trimmed, non-empty command line.
    pub fn submit(&mut self, line: &str) -> ShellSignal {
        if line == "exit" {
            self.close();
            return ShellSignal::Exit;
        }
        if self.collaborator.send_command(line) == Ack::NotConnected {
            self.on_event("[!] No conectado al servidor.");
        }
        self.pump_events();
        ShellSignal::Continue
    }

    /// Classify one raw event line. Roster updates refresh the vocabulary;
    /// anything else is appended to the log and returned.
    pub fn on_event(&mut self, raw_line: &str) -> Option<&LoggedEntry> {
        match classify(raw_line, &mut self.vocabulary) {
            ClassifierOutcome::RosterUpdate(users) => {
                tracing::debug!("roster now has {} users", users.len());
                None
            }
            ClassifierOutcome::Entry(entry) => {
                self.log.push(entry);
                self.log.last()
            }
        }
    }

    /// Drain every pending event line. Returns how many log entries were added.
    pub fn pump_events(&mut self) -> usize {
        let before = self.log.len();
        while let Some(line) = self.collaborator.poll_event() {
            self.on_event(&line);
        }
        self.log.len() - before
    }

    fn close(&mut self) {
        if !self.closed {
            self.collaborator.close_session();
            self.closed = true;
        }
    }
}
