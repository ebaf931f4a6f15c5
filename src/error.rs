//! Error types for the chat server
//!
//! One enum per concern (protocol, registry, configuration) plus the
//! application-level umbrella. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ClientId, RoomName};

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error frame to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or rejected inbound frame
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Room/client bookkeeping rejected the command
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Startup configuration is unusable (fatal)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error (fatal for the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Too many concurrent connections
    #[error("The maximum number of clients has been reached. No more clients are allowed, the client connection will be closed")]
    CapacityExceeded,

    /// The ChatServer actor is gone (fatal - internal channel broken)
    #[error("Chat server is not running")]
    ServerClosed,

    /// TLS handshake did not complete in time
    #[error("TLS handshake timed out")]
    HandshakeTimeout,
}

/// Inbound frame errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Verb outside the fixed vocabulary
    #[error("The {0} command is not a valid command, the client connection will be closed")]
    UnknownCommand(String),

    /// Stream ended before the verb was terminated
    #[error("Connection ended before a command was received")]
    IncompleteFrame,

    /// Stream ended before the room:client-id header was terminated
    #[error("Invalid format: missing room:client header")]
    MalformedHeader,

    /// A space-terminated field grew past the framing limit
    #[error("Invalid format: command field too long")]
    FieldTooLong,

    /// Body is not valid UTF-8
    #[error("Invalid message encoding")]
    Encoding,

    /// Body exceeds the configured character limit
    #[error("Message exceeds maximum length of {max} characters")]
    MessageTooLong { max: usize },

    /// Verb is valid but only ever sent by the server
    #[error("The {0} command is only sent by the server")]
    ServerOnlyCommand(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry errors
///
/// Rendered verbatim into `ERROR` frames, so the messages are client-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Chat room {0} does not exist.")]
    RoomNotFound(RoomName),

    #[error("Chat room {0} already exists.")]
    RoomExists(RoomName),

    #[error("You cannot create the main chat room")]
    ProtectedRoom,

    #[error("You have not registered or joined chat room {room} as {client} yet, please say HELLO or JOIN first.")]
    NotRegistered { room: RoomName, client: ClientId },

    #[error("Invalid list type: {0}")]
    InvalidListKind(String),

    #[error("You must specify a {0} for this list type")]
    MissingListTarget(&'static str),
}

/// Configuration errors (fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You cannot use TLS without providing a certificate by path")]
    MissingCertificate,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("No private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
}

/// Message send errors
///
/// Occurs when a frame cannot be queued for a connection without waiting.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection's writer task has ended
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection is not draining its frames
    #[error("Outbound buffer full")]
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_messages() {
        let err = RegistryError::RoomExists(RoomName::from("lobby"));
        assert_eq!(err.to_string(), "Chat room lobby already exists.");
        let err = RegistryError::RoomNotFound(RoomName::from("nowhere"));
        assert_eq!(err.to_string(), "Chat room nowhere does not exist.");
    }

    #[test]
    fn test_protocol_message_names_command() {
        let err = ProtocolError::UnknownCommand("FOO".to_string());
        assert!(err.to_string().contains("FOO command is not a valid command"));
    }

    #[test]
    fn test_transparent_wrapping() {
        let err: AppError = RegistryError::ProtectedRoom.into();
        assert_eq!(err.to_string(), "You cannot create the main chat room");
    }
}
