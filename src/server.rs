//! ChatServer Actor implementation
//!
//! The central actor that owns the room registry. Every read and mutation
//! arrives as a `ServerCommand` over an mpsc channel and is processed to
//! completion before the next one, so no lock guards the registry.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::broadcast::{broadcast, BroadcastReport};
use crate::client::{Outbound, Session};
use crate::error::RegistryError;
use crate::listing::{ListQuery, Listing, Snapshot};
use crate::message::Frame;
use crate::room::Room;
use crate::status::Status;
use crate::types::{ClientId, RoomName};

/// Reply channel carried by each command
pub type Reply<T> = oneshot::Sender<T>;

/// Commands sent from handlers (and the outward handle) to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Register a client in an existing room
    Register {
        room: RoomName,
        client: ClientId,
        outbound: Outbound,
        reply: Reply<Result<ClientId, RegistryError>>,
    },
    /// Create a room with its first member
    CreateRoom {
        room: RoomName,
        client: ClientId,
        outbound: Outbound,
        reply: Reply<Result<String, RegistryError>>,
    },
    /// Join (or rejoin) an existing room
    JoinRoom {
        room: RoomName,
        client: ClientId,
        outbound: Outbound,
        reply: Reply<Result<String, RegistryError>>,
    },
    /// Message from a registered client
    Send {
        room: RoomName,
        client: ClientId,
        body: String,
        reply: Reply<Result<BroadcastReport, RegistryError>>,
    },
    /// Externally triggered broadcast
    SendToRoom {
        room: RoomName,
        body: String,
        reply: Reply<Result<BroadcastReport, RegistryError>>,
    },
    /// Pause a client in every room
    Pause {
        client: ClientId,
        reply: Reply<PauseSummary>,
    },
    /// Close a client in every room
    Close {
        client: ClientId,
        reply: Reply<Vec<RoomName>>,
    },
    /// A client reported an error for its session
    ReportError {
        room: RoomName,
        client: ClientId,
        reply: Reply<bool>,
    },
    /// Build a listing
    List {
        query: ListQuery,
        reply: Reply<Result<Listing, RegistryError>>,
    },
    /// Read-only status view
    Snapshot { reply: Reply<Snapshot> },
}

/// Result of pausing a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseSummary {
    pub client: ClientId,
    /// Rooms in which the client was paused, sorted
    pub rooms: Vec<RoomName>,
}

impl PauseSummary {
    pub fn is_found(&self) -> bool {
        !self.rooms.is_empty()
    }
}

impl fmt::Display for PauseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rooms.is_empty() {
            return write!(f, "Client {} not found in any chat rooms", self.client);
        }
        let rooms: Vec<&str> = self.rooms.iter().map(RoomName::as_str).collect();
        write!(f, "Client {} paused in rooms: {}", self.client, rooms.join(", "))
    }
}

/// The main ChatServer actor
///
/// Owns every room; the default room is created on startup and can never
/// be removed or recreated.
pub struct ChatServer {
    /// All rooms: RoomName -> Room
    rooms: HashMap<RoomName, Room>,
    /// Suffix counter for generated client ids
    next_id: u64,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        let default_room = RoomName::default();
        let mut rooms = HashMap::new();
        rooms.insert(default_room.clone(), Room::new(default_room));
        Self {
            rooms,
            next_id: 1,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    ///
    /// A dropped reply receiver means the requester went away; the mutation
    /// has already been committed and is not rolled back.
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Register {
                room,
                client,
                outbound,
                reply,
            } => {
                let _ = reply.send(self.handle_register(room, client, outbound));
            }
            ServerCommand::CreateRoom {
                room,
                client,
                outbound,
                reply,
            } => {
                let _ = reply.send(self.handle_create_room(room, client, outbound));
            }
            ServerCommand::JoinRoom {
                room,
                client,
                outbound,
                reply,
            } => {
                let result = self.handle_join_room(room, client, outbound);
                let _ = reply.send(result);
            }
            ServerCommand::Send {
                room,
                client,
                body,
                reply,
            } => {
                let result = self.handle_send(room, client, body);
                let _ = reply.send(result);
            }
            ServerCommand::SendToRoom { room, body, reply } => {
                let result = self.handle_send_to_room(room, body);
                let _ = reply.send(result);
            }
            ServerCommand::Pause { client, reply } => {
                let _ = reply.send(self.handle_pause(client));
            }
            ServerCommand::Close { client, reply } => {
                let result = self.handle_close(client);
                let _ = reply.send(result);
            }
            ServerCommand::ReportError {
                room,
                client,
                reply,
            } => {
                let _ = reply.send(self.handle_report_error(room, client));
            }
            ServerCommand::List { query, reply } => {
                let _ = reply.send(Listing::build(&query, &self.snapshot()));
            }
            ServerCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Handle client registration
    ///
    /// The sentinel name or an id already taken in the room gets a numeric
    /// suffix from the shared counter until it is unused.
    fn handle_register(
        &mut self,
        room_name: RoomName,
        requested: ClientId,
        outbound: Outbound,
    ) -> Result<ClientId, RegistryError> {
        let Some(room) = self.rooms.get_mut(&room_name) else {
            return Err(RegistryError::RoomNotFound(room_name));
        };

        let client_id = if requested.is_default() || room.contains(&requested) {
            loop {
                self.next_id += 1;
                let candidate = ClientId::new(format!("{}{}", requested, self.next_id));
                if !room.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            requested
        };

        room.insert(Session::new(client_id.clone(), outbound));
        info!("Client {} registered in chat room {}", client_id, room_name);
        Ok(client_id)
    }

    /// Handle room creation
    fn handle_create_room(
        &mut self,
        room_name: RoomName,
        client_id: ClientId,
        outbound: Outbound,
    ) -> Result<String, RegistryError> {
        if room_name.is_default() {
            return Err(RegistryError::ProtectedRoom);
        }
        if self.rooms.contains_key(&room_name) {
            return Err(RegistryError::RoomExists(room_name));
        }

        let mut room = Room::new(room_name.clone());
        room.insert(Session::new(client_id.clone(), outbound));
        self.rooms.insert(room_name.clone(), room);

        info!("Client {} created room {}", client_id, room_name);
        debug!("Total rooms: {}", self.rooms.len());

        Ok(format!(
            "Chatroom {} was successfully created by {}.",
            room_name, client_id
        ))
    }

    /// Handle room joining
    ///
    /// Replaces any existing session with the same id.
    fn handle_join_room(
        &mut self,
        room_name: RoomName,
        client_id: ClientId,
        outbound: Outbound,
    ) -> Result<String, RegistryError> {
        let Some(room) = self.rooms.get_mut(&room_name) else {
            return Err(RegistryError::RoomNotFound(room_name));
        };

        if room
            .insert(Session::new(client_id.clone(), outbound))
            .is_some()
        {
            debug!("Client {} replaced its session in room {}", client_id, room_name);
        }
        info!("Client {} joined room {}", client_id, room_name);

        let announcement = format!("Client {} has joined Chat room {}", client_id, room_name);
        broadcast(room, &announcement);
        Ok(announcement)
    }

    /// Handle chat message
    fn handle_send(
        &mut self,
        room_name: RoomName,
        client_id: ClientId,
        body: String,
    ) -> Result<BroadcastReport, RegistryError> {
        let not_registered = || RegistryError::NotRegistered {
            room: room_name.clone(),
            client: client_id.clone(),
        };

        let room = self.rooms.get_mut(&room_name).ok_or_else(not_registered)?;
        let session = room.get_mut(&client_id).ok_or_else(not_registered)?;
        let status = session.record_send().ok_or_else(not_registered)?;
        debug!("Client {} in room {} is now {}", client_id, room_name, status);

        Ok(broadcast(room, &body))
    }

    /// Handle externally triggered broadcast
    fn handle_send_to_room(
        &mut self,
        room_name: RoomName,
        body: String,
    ) -> Result<BroadcastReport, RegistryError> {
        let Some(room) = self.rooms.get(&room_name) else {
            return Err(RegistryError::RoomNotFound(room_name));
        };
        Ok(broadcast(room, &body))
    }

    /// Handle pause in every room containing the client
    fn handle_pause(&mut self, client_id: ClientId) -> PauseSummary {
        let mut rooms = Vec::new();
        for (room_name, room) in self.rooms.iter_mut() {
            if let Some(session) = room.get_mut(&client_id) {
                if transition(session, Status::Paused) {
                    rooms.push(room_name.clone());
                }
            }
        }
        rooms.sort();

        let summary = PauseSummary {
            client: client_id,
            rooms,
        };
        info!("{}", summary);
        summary
    }

    /// Handle graceful close in every room containing the client
    ///
    /// Farewell delivery is best-effort; the transport is shut down once the
    /// session's sender is dropped.
    fn handle_close(&mut self, client_id: ClientId) -> Vec<RoomName> {
        let mut closed = Vec::new();

        for (room_name, room) in self.rooms.iter_mut() {
            let Some(session) = room.get_mut(&client_id) else {
                continue;
            };

            transition(session, Status::Closing);
            if let Err(e) = session.send(Frame::Farewell) {
                info!("Farewell to client {} not delivered: {}", client_id, e);
            }
            transition(session, Status::Closed);

            room.remove(&client_id);
            info!("Client {} has been closed in room {}", client_id, room_name);
            closed.push(room_name.clone());
        }

        if closed.is_empty() {
            warn!("Attempted to close non-existent client {}", client_id);
        }
        closed.sort();
        closed
    }

    /// Handle a client-reported error: the session moves to ERROR, then CLOSED
    fn handle_report_error(&mut self, room_name: RoomName, client_id: ClientId) -> bool {
        let Some(room) = self.rooms.get_mut(&room_name) else {
            return false;
        };
        let Some(session) = room.get_mut(&client_id) else {
            return false;
        };

        transition(session, Status::Error);
        transition(session, Status::Closed);
        room.remove(&client_id);
        info!("Client {} removed from room {} after error", client_id, room_name);
        true
    }

    /// Read-only view: room → client → status
    fn snapshot(&self) -> Snapshot {
        self.rooms
            .iter()
            .map(|(name, room)| (name.clone(), room.statuses()))
            .collect()
    }
}

/// Apply a status change if the transition table allows it
fn transition(session: &mut Session, next: Status) -> bool {
    if session.status.can_transition_to(next) {
        session.status = next;
        true
    } else {
        warn!(
            "Illegal status transition for {}: {} -> {}",
            session.id, session.status, next
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ChatHandle;

    fn start() -> ChatHandle {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(ChatServer::new(rx).run());
        ChatHandle::new(tx)
    }

    fn outbound() -> (Outbound, mpsc::Receiver<Frame>) {
        mpsc::channel(16)
    }

    async fn status_of(handle: &ChatHandle, room: &str, client: &str) -> Option<Status> {
        let snapshot = handle.snapshot().await.unwrap();
        snapshot
            .get(&RoomName::from(room))
            .and_then(|members| members.get(&ClientId::from(client)).copied())
    }

    #[tokio::test]
    async fn test_default_room_exists() {
        let handle = start();
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.contains_key(&RoomName::from("main")));
    }

    #[tokio::test]
    async fn test_create_room_registers_creator() {
        let handle = start();
        let (tx, _rx) = outbound();
        let announcement = handle
            .create_room("lobby".into(), "alice".into(), tx)
            .await
            .unwrap();
        assert_eq!(announcement, "Chatroom lobby was successfully created by alice.");
        assert_eq!(status_of(&handle, "lobby", "alice").await, Some(Status::New));
    }

    #[tokio::test]
    async fn test_create_main_is_protected() {
        let handle = start();
        let (tx, _rx) = outbound();
        let err = handle
            .create_room("main".into(), "alice".into(), tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Registry(RegistryError::ProtectedRoom)
        ));
    }

    #[tokio::test]
    async fn test_create_existing_room() {
        let handle = start();
        let (tx, _rx) = outbound();
        handle
            .create_room("lobby".into(), "alice".into(), tx.clone())
            .await
            .unwrap();
        let err = handle
            .create_room("lobby".into(), "bob".into(), tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Registry(RegistryError::RoomExists(_))
        ));
    }

    #[tokio::test]
    async fn test_register_generates_distinct_ids() {
        let handle = start();
        let (tx, _rx) = outbound();
        let first = handle
            .register("main".into(), "client".into(), tx.clone())
            .await
            .unwrap();
        let second = handle
            .register("main".into(), "client".into(), tx)
            .await
            .unwrap();
        assert_eq!(first, ClientId::from("client2"));
        assert_eq!(second, ClientId::from("client3"));
    }

    #[tokio::test]
    async fn test_register_suffixes_taken_name() {
        let handle = start();
        let (tx, _rx) = outbound();
        let first = handle
            .register("main".into(), "alice".into(), tx.clone())
            .await
            .unwrap();
        let second = handle
            .register("main".into(), "alice".into(), tx)
            .await
            .unwrap();
        assert_eq!(first, ClientId::from("alice"));
        assert_eq!(second, ClientId::from("alice2"));
    }

    #[tokio::test]
    async fn test_register_unknown_room() {
        let handle = start();
        let (tx, _rx) = outbound();
        let err = handle
            .register("attic".into(), "client".into(), tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Registry(RegistryError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_send_requires_registration() {
        let handle = start();
        let err = handle
            .send("main".into(), "ghost".into(), "boo".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Registry(RegistryError::NotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn test_paused_sender_wakes_and_reaches_listeners_only() {
        let handle = start();
        let (a_tx, mut a_rx) = outbound();
        let (b_tx, mut b_rx) = outbound();
        let (c_tx, mut c_rx) = outbound();
        let (d_tx, mut d_rx) = outbound();

        handle.register("main".into(), "a".into(), a_tx).await.unwrap();
        handle.register("main".into(), "b".into(), b_tx).await.unwrap();
        handle.register("main".into(), "c".into(), c_tx).await.unwrap();
        handle.register("main".into(), "d".into(), d_tx).await.unwrap();

        // b becomes ACTIVE, a becomes PAUSED, c stays NEW, d becomes PAUSED
        handle.send("main".into(), "b".into(), "one".into()).await.unwrap();
        handle.send("main".into(), "b".into(), "two".into()).await.unwrap();
        handle.pause_client("a".into()).await.unwrap();
        handle.pause_client("d".into()).await.unwrap();
        while b_rx.try_recv().is_ok() {}

        let report = handle
            .send("main".into(), "a".into(), "back".into())
            .await
            .unwrap();
        assert_eq!(status_of(&handle, "main", "a").await, Some(Status::Active));
        assert_eq!(report.delivered.len(), 2);

        assert_eq!(a_rx.try_recv().ok(), Some(Frame::msg("back")));
        assert_eq!(b_rx.try_recv().ok(), Some(Frame::msg("back")));
        assert!(c_rx.try_recv().is_err());
        assert!(d_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pause_unknown_client_mutates_nothing() {
        let handle = start();
        let (tx, _rx) = outbound();
        handle.register("main".into(), "alice".into(), tx).await.unwrap();
        let before = handle.snapshot().await.unwrap();

        let summary = handle.pause_client("ghost".into()).await.unwrap();
        assert!(!summary.is_found());
        assert_eq!(summary.to_string(), "Client ghost not found in any chat rooms");
        assert_eq!(handle.snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_pause_every_room() {
        let handle = start();
        let (tx, _rx) = outbound();
        handle
            .register("main".into(), "alice".into(), tx.clone())
            .await
            .unwrap();
        handle
            .create_room("lobby".into(), "alice".into(), tx)
            .await
            .unwrap();

        let summary = handle.pause_client("alice".into()).await.unwrap();
        assert_eq!(summary.to_string(), "Client alice paused in rooms: lobby, main");
        assert_eq!(status_of(&handle, "lobby", "alice").await, Some(Status::Paused));
        assert_eq!(status_of(&handle, "main", "alice").await, Some(Status::Paused));
    }

    #[tokio::test]
    async fn test_join_announces_to_listeners() {
        let handle = start();
        let (alice_tx, mut alice_rx) = outbound();
        let (bob_tx, mut bob_rx) = outbound();
        handle
            .create_room("lobby".into(), "alice".into(), alice_tx)
            .await
            .unwrap();
        handle
            .send("lobby".into(), "alice".into(), "hi".into())
            .await
            .unwrap();
        assert_eq!(alice_rx.try_recv().ok(), Some(Frame::msg("hi")));

        let announcement = handle
            .join_room("lobby".into(), "bob".into(), bob_tx)
            .await
            .unwrap();
        assert_eq!(announcement, "Client bob has joined Chat room lobby");
        assert_eq!(
            alice_rx.try_recv().ok(),
            Some(Frame::msg("Client bob has joined Chat room lobby"))
        );
        // The joiner is NEW and hears nothing
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let handle = start();
        let (tx, _rx) = outbound();
        let err = handle
            .join_room("attic".into(), "bob".into(), tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Registry(RegistryError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_close_sends_farewell_and_removes() {
        let handle = start();
        let (tx, mut rx) = outbound();
        handle.register("main".into(), "alice".into(), tx).await.unwrap();

        handle.close_client("alice".into()).await.unwrap();
        assert_eq!(rx.recv().await, Some(Frame::Farewell));
        // Sender dropped with the session
        assert_eq!(rx.recv().await, None);
        assert_eq!(status_of(&handle, "main", "alice").await, None);
    }

    #[tokio::test]
    async fn test_close_unknown_is_noop() {
        let handle = start();
        handle.close_client("ghost".into()).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot[&RoomName::from("main")].is_empty());
    }

    #[tokio::test]
    async fn test_close_swallows_dead_connection() {
        let handle = start();
        let (tx, rx) = outbound();
        handle.register("main".into(), "alice".into(), tx).await.unwrap();
        drop(rx);
        handle.close_client("alice".into()).await.unwrap();
        assert_eq!(status_of(&handle, "main", "alice").await, None);
    }

    #[tokio::test]
    async fn test_stale_session_survives_failed_broadcast() {
        let handle = start();
        let (tx, rx) = outbound();
        let (peer_tx, _peer_rx) = outbound();
        handle.register("main".into(), "stale".into(), tx).await.unwrap();
        handle.register("main".into(), "peer".into(), peer_tx).await.unwrap();
        handle
            .send("main".into(), "stale".into(), "first".into())
            .await
            .unwrap();
        drop(rx);

        let report = handle
            .send("main".into(), "peer".into(), "anyone?".into())
            .await
            .unwrap();
        assert_eq!(report.failed, vec![ClientId::from("stale")]);
        assert_eq!(
            status_of(&handle, "main", "stale").await,
            Some(Status::Connected)
        );
    }

    #[tokio::test]
    async fn test_send_to_room() {
        let handle = start();
        let err = handle
            .send_to_room("attic".into(), "hello".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::AppError::Registry(RegistryError::RoomNotFound(_))
        ));

        let (tx, mut rx) = outbound();
        handle.register("main".into(), "alice".into(), tx).await.unwrap();
        handle
            .send("main".into(), "alice".into(), "x".into())
            .await
            .unwrap();
        let _ = rx.try_recv();

        let report = handle
            .send_to_room("main".into(), "announcement".into())
            .await
            .unwrap();
        assert_eq!(report.delivered, vec![ClientId::from("alice")]);
        assert_eq!(rx.try_recv().ok(), Some(Frame::msg("announcement")));
    }

    #[tokio::test]
    async fn test_report_error_removes_session() {
        let handle = start();
        let (tx, _rx) = outbound();
        handle.register("main".into(), "alice".into(), tx).await.unwrap();
        assert!(handle
            .report_error("main".into(), "alice".into())
            .await
            .unwrap());
        assert_eq!(status_of(&handle, "main", "alice").await, None);
        assert!(!handle
            .report_error("main".into(), "alice".into())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_through_actor() {
        let handle = start();
        let (tx, _rx) = outbound();
        handle
            .create_room("lobby".into(), "alice".into(), tx)
            .await
            .unwrap();
        let listing = handle
            .list(ListQuery::new(crate::listing::ListKind::ChatRooms))
            .await
            .unwrap();
        assert_eq!(listing.to_string(), "Chat Room List:\n\t-lobby\n\t-main\n");
    }
}
