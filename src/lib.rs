//! Multi-room Text-Protocol Chat Server Library
//!
//! A tokio chat server where clients join named rooms and broadcast short
//! text messages to everyone listening in a room.
//!
//! # Protocol
//! Each connection carries exactly one command, terminated by the client
//! half-closing its side:
//!
//! ```text
//! <VERB> <room>:<client-id> <body...EOF>
//! ```
//!
//! - `HELLO`, `NEW`, `JOIN` register the client; that connection stays open
//!   and receives the room's broadcasts
//! - `SEND` broadcasts the body as `MSG <body>` to `CONNECTED`/`ACTIVE` members
//! - `PAUSE`, `QUIT`, `LIST`, `ERROR` act on the registry and close
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning every room and session
//! - `ChatHandle` is the cloneable request/reply front door to it
//! - Each connection has a `handler` task and a writer task
//! - No locks needed - all registry access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::sync::mpsc;
//! use roomcast::{ChatHandle, ChatServer, Config, Listener};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!
//!     let listener = Listener::bind(&config, ChatHandle::new(cmd_tx)).await?;
//!     listener.run().await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handle;
pub mod handler;
pub mod listener;
pub mod listing;
pub mod message;
pub mod room;
pub mod server;
pub mod status;
pub mod tls;
pub mod types;

// Re-export main types for convenience
pub use broadcast::BroadcastReport;
pub use client::Session;
pub use config::{Cli, Config};
pub use error::{AppError, ConfigError, ProtocolError, RegistryError, SendError};
pub use handle::ChatHandle;
pub use handler::{handle_connection, Limits};
pub use listener::{ConnectionCounter, Listener};
pub use listing::{ListKind, ListQuery, Listing, Snapshot};
pub use message::{Command, Frame, Verb};
pub use room::Room;
pub use server::{ChatServer, PauseSummary, ServerCommand};
pub use status::Status;
pub use types::{ClientId, ConnectionId, RoomName};
