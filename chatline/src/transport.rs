//! The collaborator seam between the shell and the chat server.
//!
//! The shell only talks to a [`Collaborator`]: connect, register a name,
//! send command lines, close, and poll for raw event lines. [`TcpCollaborator`]
//! is the real implementation over the framed TCP protocol; tests substitute
//! a scripted fake.

use crate::chat_state::{ChatState, Outbound};
use crate::config::ChatlineConfig;
use crate::protocol::{write_frame, ClientRequest, ProtocolError};
use crate::runtime::{NameVerdict, ReceiverContext, ReceiverHandle};
use parking_lot::Mutex;
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
}

/// Reply to [`Collaborator::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReply {
    pub status: Status,
    pub message: Option<String>,
}

impl ConnectReply {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
        }
    }
}

/// Reply to [`Collaborator::set_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameReply {
    pub status: Status,
    /// The confirmed nickname on success.
    pub username: Option<String>,
    pub message: Option<String>,
}

impl NameReply {
    pub fn success(username: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            username: Some(username.into()),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            username: None,
            message: Some(message.into()),
        }
    }
}

/// Acknowledgement for a submitted command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Sent,
    NotConnected,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no conectado al servidor")]
    NotConnected,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Everything the shell needs from the outside world.
pub trait Collaborator {
    fn connect(&mut self, host: &str, port: u16) -> ConnectReply;
    fn set_name(&mut self, nickname: &str) -> NameReply;
    fn send_command(&mut self, text: &str) -> Ack;
    fn close_session(&mut self);
    /// Next pending raw event line, without blocking.
    fn poll_event(&mut self) -> Option<String>;
}

struct Connection {
    writer: Arc<Mutex<TcpStream>>,
    receiver: ReceiverHandle,
    names: flume::Receiver<NameVerdict>,
}

/// [`Collaborator`] over a TCP connection to the chat server.
pub struct TcpCollaborator {
    config: ChatlineConfig,
    state: Arc<Mutex<ChatState>>,
    events_tx: flume::Sender<String>,
    events_rx: flume::Receiver<String>,
    connection: Option<Connection>,
}

impl TcpCollaborator {
    pub fn new(config: ChatlineConfig) -> Self {
        let (events_tx, events_rx) = flume::unbounded();
        Self {
            config,
            state: Arc::new(Mutex::new(ChatState::new())),
            events_tx,
            events_rx,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| !c.receiver.is_finished())
    }

    /// Snapshot of the chat session state.
    pub fn state(&self) -> ChatState {
        self.state.lock().clone()
    }

    fn emit(&self, line: impl Into<String>) {
        let _ = self.events_tx.send(line.into());
    }

    fn send_request(&mut self, request: &ClientRequest) -> Result<(), TransportError> {
        let connection = self.connection.as_ref().ok_or(TransportError::NotConnected)?;
        let frame = request.to_frame()?;
        write_frame(&mut *connection.writer.lock(), &frame)?;
        Ok(())
    }

    fn send_file(&mut self, target: String, path: &Path) -> Result<(), TransportError> {
        let size = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                self.emit(format!("[!] Archivo no encontrado: {}", path.display()));
                return Ok(());
            }
        };
        let limit = u64::from(self.config.max_frame_len);
        if size > limit {
            self.emit(format!(
                "[!] Archivo demasiado grande: {} ({size} bytes, máximo {limit})",
                path.display()
            ));
            return Ok(());
        }
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                self.emit(format!("[ERROR] No se pudo leer el archivo: {e}"));
                return Ok(());
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.emit(format!("[INFO] Enviando {file_name} a {target}..."));
        self.send_request(&ClientRequest::File {
            target,
            file_name,
            data,
        })
    }

    fn deliver(&mut self, outbound: Outbound) -> Result<(), TransportError> {
        match outbound {
            Outbound::Request(request) => self.send_request(&request),
            Outbound::SendFile { target, path } => self.send_file(target, &path),
        }
    }
}

impl Collaborator for TcpCollaborator {
    fn connect(&mut self, host: &str, port: u16) -> ConnectReply {
        self.close_session();
        let stream = match TcpStream::connect((host, port)) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("connect to {host}:{port} failed: {e}");
                return ConnectReply::error(e.to_string());
            }
        };

        let reader = match stream.try_clone() {
            Ok(reader) => reader,
            Err(e) => return ConnectReply::error(e.to_string()),
        };

        *self.state.lock() = ChatState::new();
        let writer = Arc::new(Mutex::new(stream));
        let (names_tx, names_rx) = flume::unbounded();
        let ctx = ReceiverContext {
            state: Arc::clone(&self.state),
            events: self.events_tx.clone(),
            names: names_tx,
            writer: Arc::clone(&writer),
            config: self.config.clone(),
        };
        match ReceiverHandle::spawn(reader, ctx) {
            Ok(receiver) => {
                tracing::info!("connected to {host}:{port}");
                self.connection = Some(Connection {
                    writer,
                    receiver,
                    names: names_rx,
                });
                ConnectReply::success()
            }
            Err(e) => ConnectReply::error(e.to_string()),
        }
    }

    fn set_name(&mut self, nickname: &str) -> NameReply {
        let nickname = nickname.trim();
        if nickname.is_empty() || nickname.contains(':') || nickname.contains(',') {
            return NameReply::error("Nombre inválido");
        }
        let Some(connection) = self.connection.as_ref() else {
            return NameReply::error("No conectado al servidor");
        };
        let names = connection.names.clone();
        // Stale verdicts from an earlier attempt.
        while names.try_recv().is_ok() {}

        if let Err(e) = self.send_request(&ClientRequest::SetName(nickname.to_string())) {
            return NameReply::error(e.to_string());
        }
        match names.recv_timeout(self.config.name_timeout()) {
            Ok(NameVerdict::Accepted) => {
                self.state.lock().set_name(nickname);
                tracing::info!("registered as {nickname}");
                NameReply::success(nickname)
            }
            Ok(NameVerdict::Taken) => NameReply::error("El nombre ya está en uso."),
            Err(flume::RecvTimeoutError::Timeout) => NameReply::error("Tiempo de espera agotado"),
            Err(flume::RecvTimeoutError::Disconnected) => {
                NameReply::error("Conexión perdida con el servidor")
            }
        }
    }

    fn send_command(&mut self, text: &str) -> Ack {
        if self.connection.is_none() {
            tracing::warn!("command while disconnected: {text}");
            return Ack::NotConnected;
        }
        let effects = self.state.lock().process_command(text);
        for line in effects.lines {
            self.emit(line);
        }
        for outbound in effects.outbound {
            if let Err(e) = self.deliver(outbound) {
                tracing::warn!("send failed: {e}");
                self.emit(format!("[ERROR] No se pudo enviar: {e}"));
            }
        }
        Ack::Sent
    }

    fn close_session(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.receiver.mark_closing();
            if let Err(e) = connection.writer.lock().shutdown(Shutdown::Both) {
                tracing::debug!("shutdown: {e}");
            }
            connection.receiver.join();
            tracing::info!("session closed");
        }
    }

    fn poll_event(&mut self) -> Option<String> {
        self.events_rx.try_recv().ok()
    }
}

impl Drop for TcpCollaborator {
    fn drop(&mut self) {
        self.close_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{read_frame, Frame, FrameKind};
    use std::net::TcpListener;
    use std::thread;
    use std::time::{Duration, Instant};

    fn test_config() -> ChatlineConfig {
        ChatlineConfig {
            name_timeout_ms: 2_000,
            ..ChatlineConfig::default()
        }
    }

    fn wait_for_event(collab: &mut TcpCollaborator) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(line) = collab.poll_event() {
                return line;
            }
            assert!(Instant::now() < deadline, "no event arrived");
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Server that answers `SET_NAME` with `reply` and echoes the next
    /// frame back to the test over a channel.
    fn spawn_server(reply: &'static str) -> (u16, flume::Receiver<Frame>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = flume::unbounded();
        thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let set_name = read_frame(&mut conn, 1024).unwrap().unwrap();
            tx.send(set_name).unwrap();
            write_frame(&mut conn, &Frame::control(reply)).unwrap();
            while let Ok(Some(frame)) = read_frame(&mut conn, 1 << 20) {
                let is_list = frame.payload == b"GET_USERS";
                tx.send(frame).unwrap();
                if is_list {
                    write_frame(&mut conn, &Frame::control("LIST_USERS:Ana,Bob")).unwrap();
                }
            }
        });
        (port, rx)
    }

    #[test]
    fn connect_failure_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut collab = TcpCollaborator::new(test_config());
        let reply = collab.connect("127.0.0.1", port);
        assert_eq!(reply.status, Status::Error);
        assert!(reply.message.is_some());
        assert!(!collab.is_connected());
    }

    #[test]
    fn register_and_list() {
        let (port, frames) = spawn_server("NAME_OK");
        let mut collab = TcpCollaborator::new(test_config());
        assert_eq!(collab.connect("127.0.0.1", port), ConnectReply::success());

        let reply = collab.set_name("Carla");
        assert_eq!(reply, NameReply::success("Carla"));
        assert_eq!(frames.recv().unwrap(), Frame::control("SET_NAME:Carla"));
        assert_eq!(collab.state().name(), Some("Carla"));

        assert_eq!(collab.send_command("list"), Ack::Sent);
        assert_eq!(frames.recv().unwrap(), Frame::control("GET_USERS"));
        assert_eq!(wait_for_event(&mut collab), "USERS_UPDATE:Ana,Bob");
        assert_eq!(wait_for_event(&mut collab), "[USUARIOS CONECTADOS] Ana,Bob");

        collab.close_session();
        assert!(!collab.is_connected());
        assert_eq!(collab.poll_event(), None);
    }

    #[test]
    fn taken_name_is_an_error() {
        let (port, _frames) = spawn_server("NAME_TAKEN");
        let mut collab = TcpCollaborator::new(test_config());
        collab.connect("127.0.0.1", port);
        assert_eq!(collab.set_name("Ana"), NameReply::error("El nombre ya está en uso."));
    }

    #[test]
    fn invalid_names_never_reach_the_server() {
        let mut collab = TcpCollaborator::new(test_config());
        assert_eq!(collab.set_name("   "), NameReply::error("Nombre inválido"));
        assert_eq!(collab.set_name("a:b"), NameReply::error("Nombre inválido"));
    }

    #[test]
    fn commands_need_a_connection() {
        let mut collab = TcpCollaborator::new(test_config());
        assert_eq!(collab.send_command("list"), Ack::NotConnected);
    }

    #[test]
    fn local_feedback_and_file_sending() {
        let (port, frames) = spawn_server("NAME_OK");
        let mut collab = TcpCollaborator::new(test_config());
        collab.connect("127.0.0.1", port);
        collab.set_name("Carla");
        frames.recv().unwrap();

        collab.send_command("hola");
        assert_eq!(wait_for_event(&mut collab), "[!] Selecciona un chat primero.");

        collab.send_command("chat:Ana");
        frames.recv().unwrap();
        collab.send_command("file:/definitely/not/here.txt");
        let mut lines = Vec::new();
        while let Some(line) = collab.poll_event() {
            lines.push(line);
        }
        assert!(lines.contains(&"[!] Archivo no encontrado: /definitely/not/here.txt".to_string()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nota.txt");
        std::fs::write(&path, b"hola").unwrap();
        collab.send_command(&format!("file:{}", path.display()));
        let frame = frames.recv().unwrap();
        assert_eq!(frame.kind, FrameKind::File);
        assert_eq!(frame.payload, b"\x03Ana\x08nota.txthola");
    }

    #[test]
    fn oversized_file_is_refused_before_reading() {
        let (port, frames) = spawn_server("NAME_OK");
        let mut collab = TcpCollaborator::new(ChatlineConfig {
            max_frame_len: 8,
            ..test_config()
        });
        collab.connect("127.0.0.1", port);
        collab.set_name("Carla");
        frames.recv().unwrap();
        collab.send_command("chat:Ana");
        frames.recv().unwrap();
        while collab.poll_event().is_some() {}

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, [0u8; 100]).unwrap();
        collab.send_command(&format!("file:{}", path.display()));

        assert_eq!(
            collab.poll_event(),
            Some(format!(
                "[!] Archivo demasiado grande: {} (100 bytes, máximo 8)",
                path.display()
            ))
        );
        collab.send_command("list");
        assert_eq!(frames.recv().unwrap(), Frame::control("GET_USERS"));
    }
}
