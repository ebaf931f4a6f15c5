//! Room struct definition
//!
//! Represents a named chat room: a mapping from client id to session.

use std::collections::{BTreeMap, HashMap};

use crate::client::Session;
use crate::status::Status;
use crate::types::{ClientId, RoomName};

/// Chat room
///
/// Client ids are unique within a room. Rooms are never deleted while
/// the server runs.
#[derive(Debug)]
pub struct Room {
    /// Room name for identification
    pub name: RoomName,
    /// Members keyed by their id in this room
    sessions: HashMap<ClientId, Session>,
}

impl Room {
    /// Create an empty room
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            sessions: HashMap::new(),
        }
    }

    /// Check if a client is in this room
    pub fn contains(&self, id: &ClientId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get_mut(&mut self, id: &ClientId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Insert a session, replacing any session with the same id
    ///
    /// Returns the replaced session, if there was one.
    pub fn insert(&mut self, session: Session) -> Option<Session> {
        self.sessions.insert(session.id.clone(), session)
    }

    /// Remove a client from the room
    pub fn remove(&mut self, id: &ClientId) -> Option<Session> {
        self.sessions.remove(id)
    }

    /// Sessions that currently receive broadcasts
    pub fn listeners(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(|s| s.is_listening())
    }

    /// Read-only view of member statuses, ordered by id
    pub fn statuses(&self) -> BTreeMap<ClientId, Status> {
        self.sessions
            .values()
            .map(|s| (s.id.clone(), s.status))
            .collect()
    }
}
