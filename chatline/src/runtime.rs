//! Background receiver for the server connection.
//!
//! The socket is read on a dedicated thread so the shell loop never blocks
//! on the network. Decoded messages are folded into the shared
//! [`ChatState`] and the resulting event lines are forwarded over a `flume`
//! channel, which the shell drains between keystrokes.
//!
//! ```text
//! ┌──────────────────┐   flume: event lines   ┌────────────────────┐
//! │ receiver thread  │ ─────────────────────► │ shell loop         │
//! │ read_frame/apply │   flume: name verdict  │ classify / render  │
//! └──────────────────┘ ─────────────────────► └────────────────────┘
//! ```

use crate::chat_state::{ChatState, Outbound};
use crate::config::ChatlineConfig;
use crate::protocol::{read_frame, write_frame, ClientRequest, ProtocolError, ServerMessage};
use parking_lot::Mutex;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Event line emitted when the server connection goes away.
pub const DISCONNECTED_LINE: &str = "[DESCONECTADO] Conexión perdida con el servidor.";

/// Server answer to `SET_NAME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameVerdict {
    Accepted,
    Taken,
}

/// Everything the receiver thread needs.
pub struct ReceiverContext {
    pub state: Arc<Mutex<ChatState>>,
    pub events: flume::Sender<String>,
    pub names: flume::Sender<NameVerdict>,
    /// Write half, shared with the command sender.
    pub writer: Arc<Mutex<TcpStream>>,
    pub config: ChatlineConfig,
}

/// Handle to the running receiver thread.
pub struct ReceiverHandle {
    thread: Option<thread::JoinHandle<()>>,
    closing: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl ReceiverHandle {
    /// Spawn the receiver reading from `reader`.
    pub fn spawn(reader: TcpStream, ctx: ReceiverContext) -> io::Result<Self> {
        let closing = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let closing_flag = Arc::clone(&closing);
        let finished_flag = Arc::clone(&finished);

        let thread = thread::Builder::new()
            .name("chatline-receiver".into())
            .spawn(move || {
                receive_loop(reader, &ctx, &closing_flag);
                finished_flag.store(true, Ordering::Release);
            })?;

        Ok(Self {
            thread: Some(thread),
            closing,
            finished,
        })
    }

    /// Mark the connection as closed on purpose so no disconnect line is emitted.
    pub fn mark_closing(&self) {
        self.closing.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Wait for the thread to exit. The socket must already be shut down.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("receiver thread panicked");
            }
        }
    }
}

fn receive_loop(mut reader: TcpStream, ctx: &ReceiverContext, closing: &AtomicBool) {
    loop {
        let frame = match read_frame(&mut reader, ctx.config.max_frame_len) {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                if !closing.load(Ordering::Acquire) {
                    tracing::warn!("receiver stopped: {e}");
                    let _ = ctx.events.send(format!("[ERROR RECEPTOR] {e}"));
                }
                break;
            }
        };

        match ServerMessage::parse(frame) {
            Ok(message) => dispatch(message, ctx),
            Err(e @ (ProtocolError::Malformed(_) | ProtocolError::InvalidUtf8(_))) => {
                tracing::warn!("dropping bad message: {e}");
                let _ = ctx.events.send(format!("[ERROR RECEPTOR] {e}"));
            }
            Err(e) => {
                let _ = ctx.events.send(format!("[ERROR RECEPTOR] {e}"));
                break;
            }
        }
    }

    if !closing.load(Ordering::Acquire) {
        let _ = ctx.events.send(DISCONNECTED_LINE.to_string());
    }
    tracing::info!("receiver finished");
}

fn dispatch(message: ServerMessage, ctx: &ReceiverContext) {
    match message {
        ServerMessage::NameOk => {
            let _ = ctx.names.send(NameVerdict::Accepted);
        }
        ServerMessage::NameTaken => {
            let _ = ctx.names.send(NameVerdict::Taken);
        }
        ServerMessage::File {
            sender,
            file_name,
            data,
        } => {
            let nickname = ctx.state.lock().name().unwrap_or("chatline").to_string();
            let dir = ctx.config.download_dir_for(&nickname);
            match save_received_file(&dir, &file_name, &data) {
                Ok(path) => {
                    let _ = ctx.events.send(format!(
                        "[ARCHIVO] Recibido de {sender}: {file_name} (Guardado en {})",
                        path.display()
                    ));
                    let effects = ctx.state.lock().file_received(&sender);
                    for line in effects.lines {
                        let _ = ctx.events.send(line);
                    }
                    for outbound in effects.outbound {
                        if let Outbound::Request(request) = outbound {
                            reply(ctx, &request);
                        }
                    }
                }
                Err(e) => {
                    let _ = ctx.events.send(format!("[ERROR ARCHIVO] {e}"));
                }
            }
        }
        other => {
            let lines = ctx.state.lock().apply(&other);
            for line in lines {
                if ctx.events.send(line).is_err() {
                    break;
                }
            }
        }
    }
}

fn reply(ctx: &ReceiverContext, request: &ClientRequest) {
    let sent = request
        .to_frame()
        .and_then(|frame| write_frame(&mut *ctx.writer.lock(), &frame));
    if let Err(e) = sent {
        tracing::warn!("could not send {request:?}: {e}");
        let _ = ctx.events.send(format!("[ERROR] No se pudo enviar: {e}"));
    }
}

/// Save a received file under `dir` without overwriting anything already
/// there: `a.txt`, then `a_1.txt`, `a_2.txt`, ...
///
/// Only the final path component of `file_name` is used.
pub fn save_received_file(dir: &Path, file_name: &str, data: &[u8]) -> io::Result<PathBuf> {
    let name = Path::new(file_name).file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("nombre de archivo inválido: {file_name:?}"),
        )
    })?;
    std::fs::create_dir_all(dir)?;

    let mut dest = dir.join(name);
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut count = 1;
    while dest.exists() {
        dest = dir.join(format!("{stem}_{count}{extension}"));
        count += 1;
    }

    std::fs::write(&dest, data)?;
    tracing::info!("saved {} bytes to {}", data.len(), dest.display());
    Ok(dest)
}
