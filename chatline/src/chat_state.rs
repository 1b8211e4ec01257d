//! Client-side chat session state.
//!
//! Tracks who we are, which chat requests are waiting for an answer, which
//! chats are open and who plain text goes to. Two directions feed it:
//!
//! - [`ChatState::apply`] folds a [`ServerMessage`] in and returns the event
//!   lines to show (the same tagged strings the classifier understands).
//! - [`ChatState::process_command`] turns a submitted command line into
//!   outbound requests plus local feedback lines.

use crate::protocol::{ClientRequest, ServerMessage};
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;

/// Something to send after processing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Request(ClientRequest),
    /// Read `path` and send it to `target` as a file frame.
    SendFile { target: String, path: PathBuf },
}

/// Result of processing one command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandEffects {
    pub outbound: Vec<Outbound>,
    /// Local feedback lines, shown as if they came from the event stream.
    pub lines: Vec<String>,
}

impl CommandEffects {
    fn line(line: impl Into<String>) -> Self {
        Self {
            outbound: Vec::new(),
            lines: vec![line.into()],
        }
    }

    fn request(request: ClientRequest) -> Self {
        Self {
            outbound: vec![Outbound::Request(request)],
            lines: Vec::new(),
        }
    }

    fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

/// Files announced with `REQ_SEND_FILES_FROM` that have not all arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOffer {
    pub sender: String,
    pub remaining: u32,
    pub accepted: bool,
}

/// Shared between the command sender and the receiver thread.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    name: Option<String>,
    pending_requests: VecDeque<String>,
    open_sessions: BTreeSet<String>,
    current_target: Option<String>,
    file_offer: Option<FileOffer>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn current_target(&self) -> Option<&str> {
        self.current_target.as_deref()
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &str> {
        self.pending_requests.iter().map(String::as_str)
    }

    pub fn open_sessions(&self) -> impl Iterator<Item = &str> {
        self.open_sessions.iter().map(String::as_str)
    }

    pub fn is_open(&self, user: &str) -> bool {
        self.open_sessions.contains(user)
    }

    pub fn file_offer(&self) -> Option<&FileOffer> {
        self.file_offer.as_ref()
    }

    // ─── Inbound ────────────────────────────────────────────────────────

    /// Apply a server message and return the event lines it produces.
    ///
    /// Name replies and file frames are handled by the receiver and yield
    /// no lines here.
    pub fn apply(&mut self, message: &ServerMessage) -> Vec<String> {
        match message {
            ServerMessage::NameOk | ServerMessage::NameTaken => Vec::new(),
            ServerMessage::ListUsers(users) => vec![
                format!("USERS_UPDATE:{users}"),
                format!("[USUARIOS CONECTADOS] {users}"),
            ],
            ServerMessage::ReqChatFrom(requester) => {
                self.pending_requests.push_back(requester.clone());
                vec![format!(
                    "[SOLICITUD] {requester} quiere chatear contigo. Escribe 'accept' o 'deny' ({} pendientes).",
                    self.pending_requests.len()
                )]
            }
            ServerMessage::ChatAccepted(partner) => {
                self.open_sessions.insert(partner.clone());
                let mut lines = vec![format!("[SISTEMA] Chat con {partner} ESTABLECIDO.")];
                if self.current_target.is_none() {
                    self.current_target = Some(partner.clone());
                    lines.push(format!("[INFO] Ahora chateando con {partner}."));
                }
                lines
            }
            ServerMessage::ChatDenied(partner) => {
                if self.current_target.as_deref() == Some(partner.as_str()) {
                    self.current_target = None;
                }
                vec![format!("[SISTEMA] {partner} ha rechazado tu solicitud de chat.")]
            }
            ServerMessage::ChatStopped(partner) => {
                self.open_sessions.remove(partner);
                let mut lines = vec![format!("[SISTEMA] {partner} ha finalizado el chat.")];
                if self.current_target.as_deref() == Some(partner.as_str()) {
                    self.current_target = None;
                    lines.push(
                        "[INFO] Has vuelto al menú principal. Selecciona otro chat con 'chat:<user>'."
                            .to_string(),
                    );
                }
                lines
            }
            ServerMessage::From { sender, text } => vec![format!("[{sender}] dice: {text}")],
            ServerMessage::Error(description) => vec![format!("[ERROR] {description}")],
            ServerMessage::ReqSendFilesFrom { sender, count } => {
                self.file_offer = Some(FileOffer {
                    sender: sender.clone(),
                    remaining: *count,
                    accepted: false,
                });
                vec![format!(
                    "[SOLICITUD] {sender} quiere enviarte {count} archivo(s). Escribe 'accept' o 'deny'."
                )]
            }
            ServerMessage::AcceptSendFilesFrom(target) => vec![format!(
                "[INFO] {target} ha aceptado la transferencia. Iniciando envío..."
            )],
            ServerMessage::DenySendFilesFrom(target) => vec![format!(
                "[!] {target} ha rechazado la transferencia de archivos."
            )],
            ServerMessage::FilesReceivedFrom(target) => vec![format!(
                "[INFO] {target} ha recibido todos los archivos correctamente."
            )],
            ServerMessage::File { .. } => Vec::new(),
            ServerMessage::Unrecognized(raw) => {
                tracing::debug!("Unrecognized server message: {raw}");
                Vec::new()
            }
            ServerMessage::Ignored(kind) => {
                tracing::debug!("Ignoring frame of type {kind}");
                Vec::new()
            }
        }
    }

    /// Count down the announced files after one from `sender` was saved.
    ///
    /// When the last one arrives the server is told with `FILES_RECEIVED`.
    pub fn file_received(&mut self, sender: &str) -> CommandEffects {
        let Some(offer) = self.file_offer.as_mut().filter(|o| o.sender == sender) else {
            return CommandEffects::default();
        };
        offer.remaining = offer.remaining.saturating_sub(1);
        if offer.remaining > 0 {
            return CommandEffects::default();
        }
        self.file_offer = None;
        CommandEffects::request(ClientRequest::FilesReceived(sender.to_string()))
            .with_line(format!("[INFO] Transferencia de {sender} completada."))
    }

    // ─── Outbound ───────────────────────────────────────────────────────

    /// Translate a trimmed, non-empty command line.
    pub fn process_command(&mut self, line: &str) -> CommandEffects {
        if let Some(requester) = self.pending_requests.front().cloned() {
            return match line {
                "accept" => self.accept_request(),
                "deny" => self.deny_request(),
                _ => CommandEffects::line(format!(
                    "[!] BLOQUEO: Debes 'accept' o 'deny' la solicitud de {requester}."
                )),
            };
        }

        match line {
            "list" => return CommandEffects::request(ClientRequest::GetUsers),
            "sessions" => return self.sessions_summary(),
            "accept" => return self.accept_files(),
            "deny" => return self.deny_files(),
            "stop" => {
                let target = self.current_target.clone();
                return self.stop(target);
            }
            _ => {}
        }

        if let Some(path) = line.strip_prefix("file:") {
            return self.send_file(path);
        }
        if let Some(target) = line.strip_prefix("stop:") {
            return self.stop(Some(target.to_string()));
        }
        if let Some(target) = line.strip_prefix("chat:") {
            return self.chat(target);
        }
        self.send_text(line)
    }

    fn accept_request(&mut self) -> CommandEffects {
        match self.pending_requests.pop_front() {
            Some(requester) => CommandEffects::request(ClientRequest::AcceptChat(requester.clone()))
                .with_line(format!("[INFO] Chat con {requester} aceptado.")),
            None => CommandEffects::default(),
        }
    }

    fn deny_request(&mut self) -> CommandEffects {
        match self.pending_requests.pop_front() {
            Some(requester) => CommandEffects::request(ClientRequest::DenyChat(requester.clone()))
                .with_line(format!("[INFO] Solicitud de {requester} rechazada.")),
            None => CommandEffects::default(),
        }
    }

    fn accept_files(&mut self) -> CommandEffects {
        match self.file_offer.as_mut().filter(|o| !o.accepted) {
            Some(offer) => {
                offer.accepted = true;
                let sender = offer.sender.clone();
                CommandEffects::request(ClientRequest::AcceptSendFiles(sender.clone()))
                    .with_line(format!("[INFO] Transferencia de {sender} aceptada."))
            }
            None => CommandEffects::line("[!] No hay solicitudes pendientes."),
        }
    }

    fn deny_files(&mut self) -> CommandEffects {
        if !self.file_offer.as_ref().is_some_and(|o| !o.accepted) {
            return CommandEffects::line("[!] No hay solicitudes pendientes.");
        }
        match self.file_offer.take() {
            Some(FileOffer { sender, .. }) => {
                CommandEffects::request(ClientRequest::DenySendFiles(sender.clone()))
                    .with_line(format!("[INFO] Transferencia de {sender} rechazada."))
            }
            None => CommandEffects::default(),
        }
    }

    fn sessions_summary(&self) -> CommandEffects {
        let sessions = if self.open_sessions.is_empty() {
            "Ninguno".to_string()
        } else {
            self.open_sessions
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut effects = CommandEffects::line(format!("[CHATS ACTIVOS] {sessions}"));
        if let Some(target) = &self.current_target {
            effects = effects.with_line(format!("[ACTUAL] Chateando con: {target}"));
        }
        effects
    }

    fn stop(&mut self, target: Option<String>) -> CommandEffects {
        match target {
            Some(target) if self.open_sessions.contains(&target) => {
                self.open_sessions.remove(&target);
                if self.current_target.as_deref() == Some(target.as_str()) {
                    self.current_target = None;
                }
                CommandEffects::request(ClientRequest::StopChat(target))
            }
            target => CommandEffects::line(format!(
                "[!] No tienes un chat activo con {}",
                target.as_deref().unwrap_or("nadie")
            )),
        }
    }

    fn chat(&mut self, target: &str) -> CommandEffects {
        if target.is_empty() {
            return CommandEffects::line("[!] Indica un usuario: chat:<user>");
        }
        if self.name.as_deref() == Some(target) {
            return CommandEffects::line("[!] No puedes chatear contigo mismo.");
        }
        self.current_target = Some(target.to_string());
        if self.open_sessions.contains(target) {
            return CommandEffects::line(format!("[INFO] Cambiado a chat con {target}."));
        }
        CommandEffects::request(ClientRequest::ReqChat(target.to_string()))
            .with_line(format!("[SISTEMA] Solicitud enviada a {target}. Esperando..."))
    }

    fn send_file(&self, path: &str) -> CommandEffects {
        match &self.current_target {
            Some(target) => CommandEffects {
                outbound: vec![Outbound::SendFile {
                    target: target.clone(),
                    path: PathBuf::from(path),
                }],
                lines: Vec::new(),
            },
            None => CommandEffects::line("[!] Selecciona un chat primero."),
        }
    }

    fn send_text(&self, text: &str) -> CommandEffects {
        match &self.current_target {
            Some(target) => CommandEffects::request(ClientRequest::Chat {
                target: target.clone(),
                text: text.to_string(),
            })
            .with_line(format!("[YO] {text}")),
            None => CommandEffects::line("[!] Selecciona un chat primero."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(effects: &CommandEffects) -> Option<&ClientRequest> {
        effects.outbound.iter().find_map(|o| match o {
            Outbound::Request(r) => Some(r),
            Outbound::SendFile { .. } => None,
        })
    }

    fn chatting_with(partner: &str) -> ChatState {
        let mut state = ChatState::new();
        state.set_name("Me");
        state.apply(&ServerMessage::ChatAccepted(partner.into()));
        state
    }

    // ── Inbound ──────────────────────────────────────────────────────

    #[test]
    fn list_users_emits_roster_then_notice() {
        let mut state = ChatState::new();
        let lines = state.apply(&ServerMessage::ListUsers("Ana,Bob".into()));
        assert_eq!(lines, ["USERS_UPDATE:Ana,Bob", "[USUARIOS CONECTADOS] Ana,Bob"]);
    }

    #[test]
    fn chat_request_is_queued() {
        let mut state = ChatState::new();
        state.apply(&ServerMessage::ReqChatFrom("Ana".into()));
        let lines = state.apply(&ServerMessage::ReqChatFrom("Bob".into()));
        assert!(lines[0].starts_with("[SOLICITUD] Bob quiere chatear contigo."));
        assert!(lines[0].ends_with("(2 pendientes)."));
        assert_eq!(state.pending_requests().collect::<Vec<_>>(), ["Ana", "Bob"]);
    }

    #[test]
    fn first_accepted_chat_becomes_target() {
        let mut state = ChatState::new();
        let lines = state.apply(&ServerMessage::ChatAccepted("Ana".into()));
        assert_eq!(
            lines,
            ["[SISTEMA] Chat con Ana ESTABLECIDO.", "[INFO] Ahora chateando con Ana."]
        );
        let lines = state.apply(&ServerMessage::ChatAccepted("Bob".into()));
        assert_eq!(lines.len(), 1);
        assert_eq!(state.current_target(), Some("Ana"));
        assert!(state.is_open("Bob"));
    }

    #[test]
    fn stopped_chat_clears_target() {
        let mut state = chatting_with("Ana");
        let lines = state.apply(&ServerMessage::ChatStopped("Ana".into()));
        assert_eq!(lines[0], "[SISTEMA] Ana ha finalizado el chat.");
        assert!(lines[1].starts_with("[INFO] Has vuelto al menú principal."));
        assert_eq!(state.current_target(), None);
        assert!(!state.is_open("Ana"));
    }

    #[test]
    fn denied_chat_clears_matching_target() {
        let mut state = ChatState::new();
        state.process_command("chat:Bob");
        assert_eq!(state.current_target(), Some("Bob"));
        state.apply(&ServerMessage::ChatDenied("Bob".into()));
        assert_eq!(state.current_target(), None);
    }

    #[test]
    fn messages_and_errors() {
        let mut state = ChatState::new();
        assert_eq!(
            state.apply(&ServerMessage::From {
                sender: "Ana".into(),
                text: "hola".into()
            }),
            ["[Ana] dice: hola"]
        );
        assert_eq!(
            state.apply(&ServerMessage::Error("Usuario X no encontrado".into())),
            ["[ERROR] Usuario X no encontrado"]
        );
        assert!(state.apply(&ServerMessage::NameOk).is_empty());
        assert!(state.apply(&ServerMessage::Unrecognized("??".into())).is_empty());
    }

    // ── Outbound ─────────────────────────────────────────────────────

    #[test]
    fn list_requests_users() {
        let mut state = ChatState::new();
        let effects = state.process_command("list");
        assert_eq!(request(&effects), Some(&ClientRequest::GetUsers));
        assert!(effects.lines.is_empty());
    }

    #[test]
    fn pending_request_blocks_other_commands() {
        let mut state = ChatState::new();
        state.apply(&ServerMessage::ReqChatFrom("Ana".into()));
        let blocked = state.process_command("list");
        assert!(blocked.outbound.is_empty());
        assert_eq!(blocked.lines, ["[!] BLOQUEO: Debes 'accept' o 'deny' la solicitud de Ana."]);

        let accepted = state.process_command("accept");
        assert_eq!(request(&accepted), Some(&ClientRequest::AcceptChat("Ana".into())));
        assert_eq!(accepted.lines, ["[INFO] Chat con Ana aceptado."]);
        assert_eq!(state.pending_requests().count(), 0);
    }

    #[test]
    fn deny_takes_oldest_request() {
        let mut state = ChatState::new();
        state.apply(&ServerMessage::ReqChatFrom("Ana".into()));
        state.apply(&ServerMessage::ReqChatFrom("Bob".into()));
        let denied = state.process_command("deny");
        assert_eq!(request(&denied), Some(&ClientRequest::DenyChat("Ana".into())));
        assert_eq!(state.pending_requests().collect::<Vec<_>>(), ["Bob"]);
    }

    #[test]
    fn accept_without_requests_is_a_notice() {
        let mut state = ChatState::new();
        let effects = state.process_command("accept");
        assert!(effects.outbound.is_empty());
        assert_eq!(effects.lines, ["[!] No hay solicitudes pendientes."]);
    }

    #[test]
    fn file_offer_is_accepted_then_counted_down() {
        let mut state = ChatState::new();
        let lines = state.apply(&ServerMessage::ReqSendFilesFrom {
            sender: "Ana".into(),
            count: 2,
        });
        assert_eq!(
            lines,
            ["[SOLICITUD] Ana quiere enviarte 2 archivo(s). Escribe 'accept' o 'deny'."]
        );

        let accepted = state.process_command("accept");
        assert_eq!(request(&accepted), Some(&ClientRequest::AcceptSendFiles("Ana".into())));
        assert_eq!(accepted.lines, ["[INFO] Transferencia de Ana aceptada."]);
        assert_eq!(
            state.process_command("accept").lines,
            ["[!] No hay solicitudes pendientes."]
        );

        assert_eq!(state.file_received("Bob"), CommandEffects::default());
        assert_eq!(state.file_received("Ana"), CommandEffects::default());
        assert_eq!(state.file_offer().map(|o| o.remaining), Some(1));

        let done = state.file_received("Ana");
        assert_eq!(request(&done), Some(&ClientRequest::FilesReceived("Ana".into())));
        assert_eq!(done.lines, ["[INFO] Transferencia de Ana completada."]);
        assert_eq!(state.file_offer(), None);
        assert_eq!(state.file_received("Ana"), CommandEffects::default());
    }

    #[test]
    fn file_offer_can_be_denied() {
        let mut state = ChatState::new();
        state.apply(&ServerMessage::ReqSendFilesFrom {
            sender: "Bob".into(),
            count: 1,
        });
        let denied = state.process_command("deny");
        assert_eq!(request(&denied), Some(&ClientRequest::DenySendFiles("Bob".into())));
        assert_eq!(denied.lines, ["[INFO] Transferencia de Bob rechazada."]);
        assert_eq!(state.file_offer(), None);
    }

    #[test]
    fn chat_request_answers_before_file_offer() {
        let mut state = ChatState::new();
        state.apply(&ServerMessage::ReqSendFilesFrom {
            sender: "Bob".into(),
            count: 1,
        });
        state.apply(&ServerMessage::ReqChatFrom("Ana".into()));
        let accepted = state.process_command("accept");
        assert_eq!(request(&accepted), Some(&ClientRequest::AcceptChat("Ana".into())));
        assert!(state.file_offer().is_some());
    }

    #[test]
    fn chat_with_self_is_refused() {
        let mut state = ChatState::new();
        state.set_name("Me");
        let effects = state.process_command("chat:Me");
        assert!(effects.outbound.is_empty());
        assert_eq!(effects.lines, ["[!] No puedes chatear contigo mismo."]);
    }

    #[test]
    fn chat_with_new_user_sends_request() {
        let mut state = ChatState::new();
        let effects = state.process_command("chat:Bob");
        assert_eq!(request(&effects), Some(&ClientRequest::ReqChat("Bob".into())));
        assert_eq!(effects.lines, ["[SISTEMA] Solicitud enviada a Bob. Esperando..."]);
    }

    #[test]
    fn chat_with_open_session_switches_target() {
        let mut state = chatting_with("Ana");
        state.apply(&ServerMessage::ChatAccepted("Bob".into()));
        let effects = state.process_command("chat:Bob");
        assert!(effects.outbound.is_empty());
        assert_eq!(state.current_target(), Some("Bob"));
    }

    #[test]
    fn text_goes_to_current_target_and_is_echoed() {
        let mut state = chatting_with("Ana");
        let effects = state.process_command("hola: que tal");
        assert_eq!(
            request(&effects),
            Some(&ClientRequest::Chat {
                target: "Ana".into(),
                text: "hola: que tal".into()
            })
        );
        assert_eq!(effects.lines, ["[YO] hola: que tal"]);
    }

    #[test]
    fn text_without_target_is_refused() {
        let mut state = ChatState::new();
        let effects = state.process_command("hola");
        assert!(effects.outbound.is_empty());
        assert_eq!(effects.lines, ["[!] Selecciona un chat primero."]);
    }

    #[test]
    fn stop_defaults_to_current_target() {
        let mut state = chatting_with("Ana");
        let effects = state.process_command("stop");
        assert_eq!(request(&effects), Some(&ClientRequest::StopChat("Ana".into())));
        assert_eq!(state.current_target(), None);

        let again = state.process_command("stop:Ana");
        assert_eq!(again.lines, ["[!] No tienes un chat activo con Ana"]);
    }

    #[test]
    fn sessions_summary_lines() {
        let mut state = ChatState::new();
        assert_eq!(state.process_command("sessions").lines, ["[CHATS ACTIVOS] Ninguno"]);

        let mut state = chatting_with("Bob");
        state.apply(&ServerMessage::ChatAccepted("Ana".into()));
        assert_eq!(
            state.process_command("sessions").lines,
            ["[CHATS ACTIVOS] Ana, Bob", "[ACTUAL] Chateando con: Bob"]
        );
    }

    #[test]
    fn file_needs_a_target() {
        let mut state = ChatState::new();
        assert_eq!(
            state.process_command("file:/tmp/a.txt").lines,
            ["[!] Selecciona un chat primero."]
        );
        let mut state = chatting_with("Ana");
        let effects = state.process_command("file:/tmp/a.txt");
        assert_eq!(
            effects.outbound,
            [Outbound::SendFile {
                target: "Ana".into(),
                path: PathBuf::from("/tmp/a.txt")
            }]
        );
    }
}
