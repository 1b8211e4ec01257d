//! # chatline
//!
//! Input assistance and event display for a line-oriented chat shell.
//!
//! ## Architecture
//!
//! ```text
//! keys ─► Shell ─► InputSession ─► completions (Vocabulary)
//!           │
//!           ├─► Collaborator ─► TcpCollaborator ─► server
//!           │         ▲                 │
//!           │         └── flume ◄── receiver thread (ChatState)
//!           ▼
//!        classifier ─► EventLog ─► formatter ─► terminal
//! ```
//!
//! - **completions**: prefix/segment suggestions, cycling, inline hints
//! - **classifier**: roster updates and display categories for event lines
//! - **chat_state**: client session state and command translation
//! - **protocol**: length-prefixed TLV frames and message parsing
//! - **transport** / **runtime**: the TCP collaborator and its receiver thread
//! - **shell**: the single actor tying keys, events and the log together

pub mod chat_state;
pub mod classifier;
pub mod completions;
pub mod config;
pub mod event_log;
pub mod formatter;
pub mod input;
pub mod keybindings;
pub mod protocol;
pub mod runtime;
pub mod shell;
pub mod transport;
pub mod vocabulary;

pub use classifier::{classify, Category, ClassifierOutcome, LogEntry};
pub use completions::{accept, compute_suggestions, cycle, render_hint, HintRecord, InputState};
pub use config::ChatlineConfig;
pub use shell::{LoginFailure, Shell, ShellSignal};
pub use transport::{Collaborator, TcpCollaborator};
pub use vocabulary::Vocabulary;
