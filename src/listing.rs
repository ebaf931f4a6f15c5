//! Room and client listings
//!
//! Every listing is built as one structured `Listing` value from a registry
//! snapshot. `Display` renders the prose form sent over the wire and
//! `to_json` renders the structured form.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::RegistryError;
use crate::status::Status;
use crate::types::{ClientId, RoomName};

/// Read-only view of the registry: room → client → status
pub type Snapshot = BTreeMap<RoomName, BTreeMap<ClientId, Status>>;

/// Supported listing kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// All room names
    ChatRooms,
    /// All rooms with members and their status
    All,
    /// All rooms with member ids
    ChatRoomAndClients,
    /// Rooms that contain a given client
    ClientChatRooms,
    /// Members of a given room
    ClientsForChatRoom,
}

impl ListKind {
    /// Parse a LIST body; an empty body selects `CHAT_ROOMS`
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let token = raw.trim().to_uppercase();
        match token.as_str() {
            "" | "CHAT_ROOMS" => Ok(ListKind::ChatRooms),
            "ALL" => Ok(ListKind::All),
            "CHAT_ROOM_AND_CLIENTS" => Ok(ListKind::ChatRoomAndClients),
            "CLIENT_CHAT_ROOMS" => Ok(ListKind::ClientChatRooms),
            "CLIENTS_FOR_CHAT_ROOM" => Ok(ListKind::ClientsForChatRoom),
            _ => Err(RegistryError::InvalidListKind(raw.trim().to_string())),
        }
    }
}

/// A listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub kind: ListKind,
    pub client: Option<ClientId>,
    pub room: Option<RoomName>,
}

impl ListQuery {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            client: None,
            room: None,
        }
    }

    pub fn client(mut self, client: ClientId) -> Self {
        self.client = Some(client);
        self
    }

    pub fn room(mut self, room: RoomName) -> Self {
        self.room = Some(room);
        self
    }
}

/// Structured listing result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Listing {
    ChatRooms {
        rooms: Vec<RoomName>,
    },
    All {
        rooms: Snapshot,
    },
    ChatRoomAndClients {
        rooms: BTreeMap<RoomName, Vec<ClientId>>,
    },
    ClientChatRooms {
        client_id: ClientId,
        rooms: Vec<RoomName>,
    },
    ClientsForChatRoom {
        room: RoomName,
        clients: Vec<ClientId>,
    },
}

impl Listing {
    /// Build a listing from a snapshot
    pub fn build(query: &ListQuery, snapshot: &Snapshot) -> Result<Self, RegistryError> {
        let listing = match query.kind {
            ListKind::ChatRooms => Listing::ChatRooms {
                rooms: snapshot.keys().cloned().collect(),
            },
            ListKind::All => Listing::All {
                rooms: snapshot.clone(),
            },
            ListKind::ChatRoomAndClients => Listing::ChatRoomAndClients {
                rooms: snapshot
                    .iter()
                    .map(|(room, members)| (room.clone(), members.keys().cloned().collect()))
                    .collect(),
            },
            ListKind::ClientChatRooms => {
                let client = query
                    .client
                    .clone()
                    .ok_or(RegistryError::MissingListTarget("client id"))?;
                let rooms = snapshot
                    .iter()
                    .filter(|(_, members)| members.contains_key(&client))
                    .map(|(room, _)| room.clone())
                    .collect();
                Listing::ClientChatRooms {
                    client_id: client,
                    rooms,
                }
            }
            ListKind::ClientsForChatRoom => {
                let room = query
                    .room
                    .clone()
                    .ok_or(RegistryError::MissingListTarget("chat room"))?;
                let members = snapshot
                    .get(&room)
                    .ok_or_else(|| RegistryError::RoomNotFound(room.clone()))?;
                Listing::ClientsForChatRoom {
                    clients: members.keys().cloned().collect(),
                    room,
                }
            }
        };
        Ok(listing)
    }

    /// Structured JSON form
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listing::ChatRooms { rooms } => {
                writeln!(f, "Chat Room List:")?;
                for room in rooms {
                    writeln!(f, "\t-{}", room)?;
                }
            }
            Listing::All { rooms } => {
                writeln!(f, "Chat Room List With Clients and Status:")?;
                for (room, members) in rooms {
                    writeln!(f, "\t-{}", room)?;
                    for (client, status) in members {
                        writeln!(f, "\t\t+Client:{}\t+Status:{}", client, status)?;
                    }
                }
            }
            Listing::ChatRoomAndClients { rooms } => {
                writeln!(f, "Chat Room List With Clients:")?;
                for (room, members) in rooms {
                    writeln!(f, "\t-{}", room)?;
                    for client in members {
                        writeln!(f, "\t\t+{}", client)?;
                    }
                }
            }
            Listing::ClientChatRooms { client_id, rooms } => {
                writeln!(f, "Chat Room List For Client {}:", client_id)?;
                for room in rooms {
                    writeln!(f, "\t-{}", room)?;
                }
            }
            Listing::ClientsForChatRoom { room, clients } => {
                writeln!(f, "Chat Room List of Clients belonging to {}:", room)?;
                for client in clients {
                    writeln!(f, "\t-{}", client)?;
                }
            }
        }
        Ok(())
    }
}
