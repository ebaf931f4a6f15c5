//! Cloneable front door to the ChatServer actor
//!
//! `snapshot`, `send_to_room`, `pause_client` and `close_client` are the
//! operations offered to code outside the wire protocol (admin tools,
//! push gateways). The remaining methods back the Command Processor.

use tokio::sync::{mpsc, oneshot};

use crate::broadcast::BroadcastReport;
use crate::client::Outbound;
use crate::error::AppError;
use crate::listing::{ListQuery, Listing, Snapshot};
use crate::server::{PauseSummary, Reply, ServerCommand};
use crate::types::{ClientId, RoomName};

/// Handle for issuing commands to the registry
#[derive(Debug, Clone)]
pub struct ChatHandle {
    sender: mpsc::Sender<ServerCommand>,
}

impl ChatHandle {
    pub fn new(sender: mpsc::Sender<ServerCommand>) -> Self {
        Self { sender }
    }

    /// Send a command and wait for the actor's reply
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ServerCommand,
    ) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| AppError::ServerClosed)?;
        response.await.map_err(|_| AppError::ServerClosed)
    }

    /// Read-only view of every room's members and their status
    pub async fn snapshot(&self) -> Result<Snapshot, AppError> {
        self.request(|reply| ServerCommand::Snapshot { reply }).await
    }

    /// Broadcast `text` to a room's listening members
    pub async fn send_to_room(
        &self,
        room: RoomName,
        text: String,
    ) -> Result<BroadcastReport, AppError> {
        let result = self
            .request(|reply| ServerCommand::SendToRoom {
                room,
                body: text,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Pause a client in every room it belongs to
    pub async fn pause_client(&self, client: ClientId) -> Result<PauseSummary, AppError> {
        self.request(|reply| ServerCommand::Pause { client, reply })
            .await
    }

    /// Close a client in every room it belongs to; unknown ids are ignored
    pub async fn close_client(&self, client: ClientId) -> Result<(), AppError> {
        self.request(|reply| ServerCommand::Close { client, reply })
            .await
            .map(|_| ())
    }

    pub async fn register(
        &self,
        room: RoomName,
        client: ClientId,
        outbound: Outbound,
    ) -> Result<ClientId, AppError> {
        let result = self
            .request(|reply| ServerCommand::Register {
                room,
                client,
                outbound,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn create_room(
        &self,
        room: RoomName,
        client: ClientId,
        outbound: Outbound,
    ) -> Result<String, AppError> {
        let result = self
            .request(|reply| ServerCommand::CreateRoom {
                room,
                client,
                outbound,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn join_room(
        &self,
        room: RoomName,
        client: ClientId,
        outbound: Outbound,
    ) -> Result<String, AppError> {
        let result = self
            .request(|reply| ServerCommand::JoinRoom {
                room,
                client,
                outbound,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Record a message from a registered client and broadcast it
    pub async fn send(
        &self,
        room: RoomName,
        client: ClientId,
        body: String,
    ) -> Result<BroadcastReport, AppError> {
        let result = self
            .request(|reply| ServerCommand::Send {
                room,
                client,
                body,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Rooms the client was closed in
    pub async fn close(&self, client: ClientId) -> Result<Vec<RoomName>, AppError> {
        self.request(|reply| ServerCommand::Close { client, reply })
            .await
    }

    /// Move a registered session to ERROR and drop it; false if it was unknown
    pub async fn report_error(&self, room: RoomName, client: ClientId) -> Result<bool, AppError> {
        self.request(|reply| ServerCommand::ReportError {
            room,
            client,
            reply,
        })
        .await
    }

    pub async fn list(&self, query: ListQuery) -> Result<Listing, AppError> {
        let result = self
            .request(|reply| ServerCommand::List { query, reply })
            .await?;
        Ok(result?)
    }
}
