//! Message protocol definitions
//!
//! Plain-text frames, one per connection:
//!
//! ```text
//! <VERB> <room>:<client-id> <body...EOF>
//! ```
//!
//! Outbound frames carry a class prefix (`MSG`, `ERROR`) and no delimiter,
//! except the farewell which is a bare string.

use crate::error::{AppError, ProtocolError};
use crate::types::{ClientId, RoomName, DEFAULT_CLIENT, DEFAULT_ROOM};

/// Text written to a session's connection when it is closed gracefully
pub const FAREWELL: &str = "Good Bye!";

/// Client → Server command verb
///
/// Matched case-insensitively; the vocabulary is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Create a room and register in it
    New,
    /// List rooms and/or clients
    List,
    /// Join an existing room
    Join,
    /// Register in an existing room
    Hello,
    /// Broadcast a message to a room
    Send,
    /// Pause a client in every room
    Pause,
    /// Close a client in every room
    Quit,
    /// Client-reported error
    Error,
    /// Server-to-client only
    From,
    /// Server-to-client only
    Msg,
}

impl Verb {
    /// Parse a raw verb token (trimmed, upper-cased)
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let token = raw.trim().to_uppercase();
        let verb = match token.as_str() {
            "NEW" => Verb::New,
            "LIST" => Verb::List,
            "JOIN" => Verb::Join,
            "HELLO" => Verb::Hello,
            "SEND" => Verb::Send,
            "PAUSE" => Verb::Pause,
            "QUIT" => Verb::Quit,
            "ERROR" => Verb::Error,
            "FROM" => Verb::From,
            "MSG" => Verb::Msg,
            _ => return Err(ProtocolError::UnknownCommand(token)),
        };
        Ok(verb)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::New => "NEW",
            Verb::List => "LIST",
            Verb::Join => "JOIN",
            Verb::Hello => "HELLO",
            Verb::Send => "SEND",
            Verb::Pause => "PAUSE",
            Verb::Quit => "QUIT",
            Verb::Error => "ERROR",
            Verb::From => "FROM",
            Verb::Msg => "MSG",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `room:client-id` part of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub room: RoomName,
    pub client: ClientId,
    /// True when the raw header was malformed and defaults were used
    pub defaulted: bool,
}

impl Header {
    /// Parse a header leniently
    ///
    /// Anything but exactly two non-empty parts around a single `:` falls
    /// back to `main`/`client`.
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        match parts.as_slice() {
            [room, client] if !room.is_empty() && !client.is_empty() => Self {
                room: RoomName::from(*room),
                client: ClientId::from(*client),
                defaulted: false,
            },
            _ => Self {
                room: RoomName::from(DEFAULT_ROOM),
                client: ClientId::from(DEFAULT_CLIENT),
                defaulted: true,
            },
        }
    }
}

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub room: RoomName,
    pub client: ClientId,
    pub body: String,
}

/// Server → Client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Broadcast payload or informational reply
    Msg(String),
    /// Failure notice, optionally addressed to a room/client pair
    Error {
        context: Option<(RoomName, ClientId)>,
        text: String,
    },
    /// Graceful close
    Farewell,
}

impl Frame {
    pub fn msg(text: impl Into<String>) -> Self {
        Frame::Msg(text.into())
    }

    pub fn error(text: impl Into<String>) -> Self {
        Frame::Error {
            context: None,
            text: text.into(),
        }
    }

    pub fn error_for(room: RoomName, client: ClientId, text: impl Into<String>) -> Self {
        Frame::Error {
            context: Some((room, client)),
            text: text.into(),
        }
    }

    /// Render the frame as it goes over the wire
    pub fn to_wire(&self) -> String {
        match self {
            Frame::Msg(text) => format!("MSG {}", text),
            Frame::Error {
                context: Some((room, client)),
                text,
            } => format!("ERROR {}:{} {}", room, client, text),
            Frame::Error { context: None, text } => format!("ERROR {}", text),
            Frame::Farewell => FAREWELL.to_string(),
        }
    }
}

/// Convert errors to ERROR frames for client notification
impl From<&AppError> for Frame {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Io(_) | AppError::ServerClosed | AppError::HandshakeTimeout => {
                Frame::error("Server error")
            }
            other => Frame::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_case_insensitive() {
        assert_eq!(Verb::parse("hello ").unwrap(), Verb::Hello);
        assert_eq!(Verb::parse("Send").unwrap(), Verb::Send);
        assert_eq!(Verb::parse(" QUIT ").unwrap(), Verb::Quit);
    }

    #[test]
    fn test_unknown_verb() {
        match Verb::parse("foo") {
            Err(ProtocolError::UnknownCommand(verb)) => assert_eq!(verb, "FOO"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_header_parse() {
        let header = Header::parse("lobby:alice ");
        assert_eq!(header.room, RoomName::from("lobby"));
        assert_eq!(header.client, ClientId::from("alice"));
        assert!(!header.defaulted);
    }

    #[test]
    fn test_header_malformed_defaults() {
        for raw in ["lobby", "a:b:c", ":alice", "lobby:", ""] {
            let header = Header::parse(raw);
            assert!(header.defaulted, "{raw:?}");
            assert_eq!(header.room, RoomName::from("main"));
            assert_eq!(header.client, ClientId::from("client"));
        }
    }

    #[test]
    fn test_frame_wire_format() {
        assert_eq!(Frame::msg("hello there").to_wire(), "MSG hello there");
        assert_eq!(Frame::error("bad").to_wire(), "ERROR bad");
        assert_eq!(
            Frame::error_for("lobby".into(), "bob".into(), "nope").to_wire(),
            "ERROR lobby:bob nope"
        );
        assert_eq!(Frame::Farewell.to_wire(), "Good Bye!");
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = AppError::Io(std::io::Error::other("secret detail"));
        assert_eq!(Frame::from(&err).to_wire(), "ERROR Server error");
    }
}
