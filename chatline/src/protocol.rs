//! Wire protocol spoken with the chat server.
//!
//! Every message is a TLV frame:
//!
//! ```text
//! ┌──────────┬──────────────────┬─────────────────┐
//! │ type: u8 │ length: u32 (BE) │ payload (bytes) │
//! └──────────┴──────────────────┴─────────────────┘
//! ```
//!
//! Types `0` (chat text) and `1` (control) carry UTF-8 strings such as
//! `SET_NAME:Ana` or `FROM:Bob:hola`. Type `2` carries a file:
//! `name_len(1) | name | file_name_len(1) | file_name | data`, where the
//! first name is the destination on the way out and the sender on the way in.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 5;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("payload of {len} bytes does not fit a frame header")]
    PayloadTooLarge { len: usize },

    #[error("connection closed mid-frame")]
    Truncated,

    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("{field} is {len} bytes; at most 255 fit in a file header")]
    NameTooLong { field: &'static str, len: usize },

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Frame type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Control,
    File,
    Other(u8),
}

impl FrameKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => FrameKind::Text,
            1 => FrameKind::Control,
            2 => FrameKind::File,
            other => FrameKind::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FrameKind::Text => 0,
            FrameKind::Control => 1,
            FrameKind::File => 2,
            FrameKind::Other(byte) => byte,
        }
    }
}

/// One TLV frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: FrameKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn control(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Control, text.into().into_bytes())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Text, text.into().into_bytes())
    }

    /// Header followed by payload.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let len = header_len(self.payload.len())?;
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.kind.as_byte());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}

/// Length field for a payload of `len` bytes.
fn header_len(len: usize) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge { len })
}

/// Write a frame in a single `write_all`.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError> {
    writer.write_all(&frame.encode()?)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// frames; a close in the middle of a frame is [`ProtocolError::Truncated`].
pub fn read_frame<R: Read>(reader: &mut R, max_len: u32) -> Result<Option<Frame>, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    let got = read_full(reader, &mut header)?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_LEN {
        return Err(ProtocolError::Truncated);
    }

    let kind = FrameKind::from_byte(header[0]);
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len as usize];
    if read_full(reader, &mut payload)? < payload.len() {
        return Err(ProtocolError::Truncated);
    }
    Ok(Some(Frame { kind, payload }))
}

/// Fill `buf` as far as the stream allows; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ─── Client → server ────────────────────────────────────────────────────

/// A request the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    SetName(String),
    GetUsers,
    ReqChat(String),
    AcceptChat(String),
    DenyChat(String),
    StopChat(String),
    AcceptSendFiles(String),
    DenySendFiles(String),
    /// Acknowledge that every announced file from a sender arrived.
    FilesReceived(String),
    Chat { target: String, text: String },
    File {
        target: String,
        file_name: String,
        data: Vec<u8>,
    },
}

impl ClientRequest {
    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        let frame = match self {
            ClientRequest::SetName(name) => Frame::control(format!("SET_NAME:{name}")),
            ClientRequest::GetUsers => Frame::control("GET_USERS"),
            ClientRequest::ReqChat(user) => Frame::control(format!("REQ_CHAT:{user}")),
            ClientRequest::AcceptChat(user) => Frame::control(format!("ACCEPT_CHAT:{user}")),
            ClientRequest::DenyChat(user) => Frame::control(format!("DENY_CHAT:{user}")),
            ClientRequest::StopChat(user) => Frame::control(format!("STOP_CHAT:{user}")),
            ClientRequest::AcceptSendFiles(user) => {
                Frame::control(format!("ACCEPT_SEND_FILES:{user}"))
            }
            ClientRequest::DenySendFiles(user) => Frame::control(format!("DENY_SEND_FILES:{user}")),
            ClientRequest::FilesReceived(user) => Frame::control(format!("FILES_RECEIVED:{user}")),
            ClientRequest::Chat { target, text } => Frame::text(format!("CHAT:{target}:{text}")),
            ClientRequest::File {
                target,
                file_name,
                data,
            } => {
                let mut payload = Vec::with_capacity(2 + target.len() + file_name.len() + data.len());
                push_short_field(&mut payload, "target", target)?;
                push_short_field(&mut payload, "file name", file_name)?;
                payload.extend_from_slice(data);
                Frame::new(FrameKind::File, payload)
            }
        };
        Ok(frame)
    }
}

fn push_short_field(buf: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), ProtocolError> {
    let len = u8::try_from(value.len()).map_err(|_| ProtocolError::NameTooLong {
        field,
        len: value.len(),
    })?;
    buf.push(len);
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

// ─── Server → client ────────────────────────────────────────────────────

/// A message received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    NameOk,
    NameTaken,
    /// Raw comma-separated roster, possibly with empty segments.
    ListUsers(String),
    ReqChatFrom(String),
    ChatAccepted(String),
    ChatDenied(String),
    ChatStopped(String),
    From { sender: String, text: String },
    Error(String),
    ReqSendFilesFrom { sender: String, count: u32 },
    AcceptSendFilesFrom(String),
    DenySendFilesFrom(String),
    FilesReceivedFrom(String),
    File {
        sender: String,
        file_name: String,
        data: Vec<u8>,
    },
    /// A text message with no known prefix.
    Unrecognized(String),
    /// A frame type the client does not handle.
    Ignored(u8),
}

impl ServerMessage {
    pub fn parse(frame: Frame) -> Result<Self, ProtocolError> {
        match frame.kind {
            FrameKind::Text | FrameKind::Control => {
                let message = String::from_utf8(frame.payload)?;
                Self::parse_text(&message)
            }
            FrameKind::File => Self::parse_file(&frame.payload),
            FrameKind::Other(byte) => Ok(ServerMessage::Ignored(byte)),
        }
    }

    fn parse_text(message: &str) -> Result<Self, ProtocolError> {
        match message {
            "NAME_OK" => return Ok(ServerMessage::NameOk),
            "NAME_TAKEN" => return Ok(ServerMessage::NameTaken),
            _ => {}
        }

        let Some((tag, rest)) = message.split_once(':') else {
            return Ok(ServerMessage::Unrecognized(message.to_string()));
        };
        let rest = rest.to_string();
        let parsed = match tag {
            "LIST_USERS" => ServerMessage::ListUsers(rest),
            "REQ_CHAT_FROM" => ServerMessage::ReqChatFrom(rest),
            "CHAT_ACCEPTED" => ServerMessage::ChatAccepted(rest),
            "CHAT_DENIED" => ServerMessage::ChatDenied(rest),
            "CHAT_STOPPED" => ServerMessage::ChatStopped(rest),
            "ERROR" => ServerMessage::Error(rest),
            "ACCEPT_SEND_FILES_FROM" => ServerMessage::AcceptSendFilesFrom(rest),
            "DENY_SEND_FILES_FROM" => ServerMessage::DenySendFilesFrom(rest),
            "FILES_RECEIVED_FROM" => ServerMessage::FilesReceivedFrom(rest),
            "FROM" => {
                let (sender, text) = rest
                    .split_once(':')
                    .ok_or_else(|| ProtocolError::Malformed(message.to_string()))?;
                ServerMessage::From {
                    sender: sender.to_string(),
                    text: text.to_string(),
                }
            }
            "REQ_SEND_FILES_FROM" => {
                let (sender, count) = rest
                    .split_once(':')
                    .ok_or_else(|| ProtocolError::Malformed(message.to_string()))?;
                let count = count
                    .parse()
                    .map_err(|_| ProtocolError::Malformed(message.to_string()))?;
                ServerMessage::ReqSendFilesFrom {
                    sender: sender.to_string(),
                    count,
                }
            }
            _ => ServerMessage::Unrecognized(message.to_string()),
        };
        Ok(parsed)
    }

    fn parse_file(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (sender, rest) = take_short_field(payload, "sender")?;
        let (file_name, data) = take_short_field(rest, "file name")?;
        Ok(ServerMessage::File {
            sender,
            file_name,
            data: data.to_vec(),
        })
    }
}

fn take_short_field<'a>(buf: &'a [u8], field: &str) -> Result<(String, &'a [u8]), ProtocolError> {
    let (&len, rest) = buf
        .split_first()
        .ok_or_else(|| ProtocolError::Malformed(format!("missing {field} length")))?;
    let len = len as usize;
    if rest.len() < len {
        return Err(ProtocolError::Malformed(format!("{field} truncated")));
    }
    let value = String::from_utf8(rest[..len].to_vec())?;
    Ok((value, &rest[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encode_layout() {
        let bytes = Frame::control("GET_USERS").encode().unwrap();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..5], &9u32.to_be_bytes());
        assert_eq!(&bytes[5..], b"GET_USERS");
    }

    #[test]
    fn read_back_written_frames() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &Frame::control("NAME_OK")).unwrap();
        write_frame(&mut wire, &Frame::text("FROM:Ana:hola")).unwrap();

        let mut reader = Cursor::new(wire);
        let first = read_frame(&mut reader, 1024).unwrap().unwrap();
        assert_eq!(first, Frame::control("NAME_OK"));
        let second = read_frame(&mut reader, 1024).unwrap().unwrap();
        assert_eq!(second.kind, FrameKind::Text);
        assert!(read_frame(&mut reader, 1024).unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut bytes = Frame::control("LIST_USERS:Ana").encode().unwrap();
        bytes.truncate(bytes.len() - 3);
        let err = read_frame(&mut Cursor::new(bytes), 1024).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated));
    }

    #[test]
    fn truncated_header_is_an_error() {
        let err = read_frame(&mut Cursor::new(vec![1u8, 0, 0]), 1024).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let bytes = Frame::control("x".repeat(100)).encode().unwrap();
        let err = read_frame(&mut Cursor::new(bytes), 10).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { len: 100, max: 10 }));
    }

    #[test]
    fn length_header_never_wraps() {
        assert_eq!(header_len(u32::MAX as usize).unwrap(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        {
            let len = u32::MAX as usize + 1;
            assert!(matches!(
                header_len(len).unwrap_err(),
                ProtocolError::PayloadTooLarge { len: l } if l == len
            ));
        }
    }

    #[test]
    fn client_requests_on_the_wire() {
        let cases = [
            (ClientRequest::SetName("Ana".into()), "SET_NAME:Ana"),
            (ClientRequest::GetUsers, "GET_USERS"),
            (ClientRequest::ReqChat("Bob".into()), "REQ_CHAT:Bob"),
            (ClientRequest::AcceptChat("Bob".into()), "ACCEPT_CHAT:Bob"),
            (ClientRequest::DenyChat("Bob".into()), "DENY_CHAT:Bob"),
            (ClientRequest::StopChat("Bob".into()), "STOP_CHAT:Bob"),
            (ClientRequest::AcceptSendFiles("Bob".into()), "ACCEPT_SEND_FILES:Bob"),
            (ClientRequest::DenySendFiles("Bob".into()), "DENY_SEND_FILES:Bob"),
            (ClientRequest::FilesReceived("Bob".into()), "FILES_RECEIVED:Bob"),
        ];
        for (request, expected) in cases {
            let frame = request.to_frame().unwrap();
            assert_eq!(frame.kind, FrameKind::Control);
            assert_eq!(frame.payload, expected.as_bytes());
        }

        let chat = ClientRequest::Chat {
            target: "Bob".into(),
            text: "a:b".into(),
        }
        .to_frame()
        .unwrap();
        assert_eq!(chat, Frame::text("CHAT:Bob:a:b"));
    }

    #[test]
    fn file_request_payload() {
        let frame = ClientRequest::File {
            target: "Bob".into(),
            file_name: "a.txt".into(),
            data: b"data".to_vec(),
        }
        .to_frame()
        .unwrap();
        assert_eq!(frame.kind, FrameKind::File);
        assert_eq!(frame.payload, b"\x03Bob\x05a.txtdata");
    }

    #[test]
    fn long_file_name_is_rejected() {
        let err = ClientRequest::File {
            target: "Bob".into(),
            file_name: "n".repeat(300),
            data: Vec::new(),
        }
        .to_frame()
        .unwrap_err();
        assert!(matches!(err, ProtocolError::NameTooLong { len: 300, .. }));
    }

    #[test]
    fn parse_server_messages() {
        let parse = |s: &str| ServerMessage::parse(Frame::control(s)).unwrap();
        assert_eq!(parse("NAME_OK"), ServerMessage::NameOk);
        assert_eq!(parse("NAME_TAKEN"), ServerMessage::NameTaken);
        assert_eq!(parse("LIST_USERS:Ana,Bob"), ServerMessage::ListUsers("Ana,Bob".into()));
        assert_eq!(parse("CHAT_ACCEPTED:Bob"), ServerMessage::ChatAccepted("Bob".into()));
        assert_eq!(
            parse("FROM:Bob:hola: que tal"),
            ServerMessage::From {
                sender: "Bob".into(),
                text: "hola: que tal".into()
            }
        );
        assert_eq!(
            parse("REQ_SEND_FILES_FROM:Bob:3"),
            ServerMessage::ReqSendFilesFrom {
                sender: "Bob".into(),
                count: 3
            }
        );
        assert!(matches!(
            ServerMessage::parse(Frame::control("REQ_SEND_FILES_FROM:Bob:tres")).unwrap_err(),
            ProtocolError::Malformed(_)
        ));
        assert_eq!(parse("ERROR:x:y"), ServerMessage::Error("x:y".into()));
        assert_eq!(parse("HELLO"), ServerMessage::Unrecognized("HELLO".into()));
        assert_eq!(parse("WHAT:ever"), ServerMessage::Unrecognized("WHAT:ever".into()));
    }

    #[test]
    fn malformed_from_is_an_error() {
        let err = ServerMessage::parse(Frame::text("FROM:Bob")).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn parse_file_frame() {
        let frame = Frame::new(FrameKind::File, b"\x03Ana\x05b.binxyz".to_vec());
        assert_eq!(
            ServerMessage::parse(frame).unwrap(),
            ServerMessage::File {
                sender: "Ana".into(),
                file_name: "b.bin".into(),
                data: b"xyz".to_vec()
            }
        );
        let short = Frame::new(FrameKind::File, b"\x09Ana".to_vec());
        assert!(matches!(
            ServerMessage::parse(short).unwrap_err(),
            ProtocolError::Malformed(_)
        ));
    }

    #[test]
    fn unknown_frame_types_are_ignored() {
        let frame = Frame::new(FrameKind::from_byte(7), Vec::new());
        assert_eq!(ServerMessage::parse(frame).unwrap(), ServerMessage::Ignored(7));
    }
}
