//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: client name, unique within one room only
//! - `RoomName`: chat room name
//! - `ConnectionId`: UUID-based identifier for a single TCP connection

use serde::Serialize;
use uuid::Uuid;

/// Name of the room that always exists
pub const DEFAULT_ROOM: &str = "main";

/// Sentinel client name that asks the server to generate an id
pub const DEFAULT_CLIENT: &str = "client";

/// Client identifier (newtype pattern)
///
/// Unique within its room, not globally: the same id may appear in
/// several rooms and refers to a different session in each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    /// Create a client id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether this is the sentinel that requests a generated id
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_CLIENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat room name
///
/// Room names are case-sensitive; `main` is reserved for the default room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomName(pub String);

impl RoomName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Whether this is the protected default room
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_ROOM
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomName {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM)
    }
}

impl From<&str> for RoomName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one accepted connection
///
/// Only used to correlate log lines; never sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_defaults_are_sentinels() {
        assert!(ClientId::default().is_default());
        assert!(RoomName::default().is_default());
        assert!(!ClientId::from("alice").is_default());
        assert!(!RoomName::from("lobby").is_default());
    }

    #[test]
    fn test_room_name_case_sensitive() {
        assert!(!RoomName::from("MAIN").is_default());
    }

    #[test]
    fn test_serialize_transparent() {
        let json = serde_json::to_string(&ClientId::from("bob")).unwrap();
        assert_eq!(json, "\"bob\"");
    }
}
