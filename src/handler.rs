//! Per-connection command processor
//!
//! Reads one command from a connection, validates it, and dispatches it to
//! the ChatServer. Frames going back to the client pass through a channel
//! into a dedicated writer task, so a registered session can keep using the
//! connection after this handler returns.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn, Instrument};

use crate::client::Outbound;
use crate::codec::read_command;
use crate::error::{AppError, ProtocolError};
use crate::handle::ChatHandle;
use crate::listener::ConnectionPermit;
use crate::listing::{ListKind, ListQuery};
use crate::message::{Command, Frame, Verb};

/// Buffered frames per connection before senders wait
const OUTBOUND_BUFFER: usize = 32;

/// Input discarded after a rejection before the connection is closed
const DRAIN_LIMIT: u64 = 64 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum concurrently counted connections
    pub max_clients: usize,
    /// Maximum body length in characters
    pub max_message_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_clients: 100,
            max_message_length: 255,
        }
    }
}

/// Handle one accepted connection
///
/// Client mistakes are answered with an `ERROR` frame and logged here; only
/// transport failures and a stopped server are returned as errors.
pub async fn handle_connection<S>(
    stream: S,
    permit: ConnectionPermit,
    handle: ChatHandle,
    limits: Limits,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let counted = permit.count();
    let (reader, writer) = tokio::io::split(stream);

    // Create channel for server -> client frames
    let (tx, rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);
    tokio::spawn(write_frames(writer, rx, permit).in_current_span());

    let mut reader = BufReader::new(reader);
    let result = serve(&mut reader, &tx, &handle, limits, counted).await;

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Some(frame) = reject(&err) {
                let _ = tx.send(frame).await;
                drain(&mut reader).await;
            }
            match err {
                AppError::Io(_) | AppError::ServerClosed => Err(err),
                _ => Ok(()),
            }
        }
    }
}

/// Discard unread input so closing sends FIN rather than RST
async fn drain<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    let mut rest = (&mut *reader).take(DRAIN_LIMIT);
    let mut sink = tokio::io::sink();
    if timeout(DRAIN_TIMEOUT, tokio::io::copy(&mut rest, &mut sink))
        .await
        .is_err()
    {
        debug!("Peer kept sending after rejection");
    }
}

/// Capacity check, decode, dispatch
async fn serve<R>(
    reader: &mut R,
    tx: &Outbound,
    handle: &ChatHandle,
    limits: Limits,
    counted: usize,
) -> Result<(), AppError>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    if counted > limits.max_clients {
        return Err(AppError::CapacityExceeded);
    }

    let command = read_command(reader, limits.max_message_length).await?;
    debug!(
        "{} {}:{} ({} chars)",
        command.verb,
        command.room,
        command.client,
        command.body.chars().count()
    );

    dispatch(command, tx, handle).await
}

/// Route a decoded command
async fn dispatch(command: Command, tx: &Outbound, handle: &ChatHandle) -> Result<(), AppError> {
    let Command {
        verb,
        room,
        client,
        body,
    } = command;

    match verb {
        Verb::Hello => {
            let id = handle.register(room.clone(), client, tx.clone()).await?;
            reply(
                tx,
                Frame::msg(format!("Client {} registered in chat room {}.", id, room)),
            )
            .await;
        }
        Verb::Send => {
            let report = handle.send(room.clone(), client.clone(), body).await?;
            debug!(
                "Client {} sent to room {}: {} delivered, {} failed",
                client,
                room,
                report.delivered.len(),
                report.failed.len()
            );
        }
        Verb::Pause => {
            let summary = handle.pause_client(client.clone()).await?;
            info!("Client {} paused: {}", client, summary);
            reply(tx, Frame::msg(summary.to_string())).await;
        }
        Verb::New => {
            let announcement = handle.create_room(room, client, tx.clone()).await?;
            info!("Chat room creation result: {}", announcement);
            reply(tx, Frame::msg(announcement)).await;
        }
        Verb::Join => {
            let announcement = handle.join_room(room, client, tx.clone()).await?;
            info!("Chat room join result: {}", announcement);
            reply(tx, Frame::msg(announcement)).await;
        }
        Verb::List => {
            let kind = ListKind::parse(&body)?;
            let listing = handle
                .list(ListQuery::new(kind).client(client).room(room))
                .await?;
            reply(tx, Frame::msg(listing.to_string())).await;
        }
        Verb::Quit => {
            let rooms = handle.close(client.clone()).await?;
            debug!("Client {} quit {} rooms", client, rooms.len());
        }
        Verb::Error => {
            info!("Error message from client {}: {}", client, body);
            if handle.report_error(room.clone(), client.clone()).await? {
                debug!("Session {}:{} closed after client error", room, client);
            }
            reply(tx, Frame::error_for(room, client, body)).await;
        }
        Verb::From | Verb::Msg => {
            return Err(ProtocolError::ServerOnlyCommand(verb.to_string()).into());
        }
    }

    Ok(())
}

/// Queue a frame for this connection; a closed writer means the peer is gone
async fn reply(tx: &Outbound, frame: Frame) {
    if tx.send(frame).await.is_err() {
        debug!("Connection closed before reply could be sent");
    }
}

/// Log a failed command and pick the frame to answer with, if any
fn reject(err: &AppError) -> Option<Frame> {
    match err {
        AppError::Protocol(ProtocolError::IncompleteFrame) => {
            warn!("Client disconnected before sending a command");
            None
        }
        AppError::Protocol(ProtocolError::Io(e)) | AppError::Io(e) => {
            info!("Connection error: {}", e);
            None
        }
        AppError::Protocol(e) => {
            warn!("Rejected frame: {}", e);
            Some(Frame::from(err))
        }
        AppError::CapacityExceeded => {
            warn!("Max clients exceeded, rejecting connection");
            Some(Frame::from(err))
        }
        AppError::Registry(e) => {
            warn!("Command failed: {}", e);
            Some(Frame::from(err))
        }
        AppError::ServerClosed => {
            error!("Chat server is not running");
            Some(Frame::from(err))
        }
        AppError::Config(_) | AppError::HandshakeTimeout => Some(Frame::from(err)),
    }
}

/// Drain queued frames into the connection, then shut it down
///
/// Runs until every sender is dropped: the handler's own and, for
/// registered clients, the session's.
async fn write_frames<W>(mut writer: W, mut frames: mpsc::Receiver<Frame>, permit: ConnectionPermit)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let written = async {
            writer.write_all(frame.to_wire().as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            debug!("Write failed, ending write task: {}", e);
            break;
        }
    }
    frames.close();

    let _ = writer.shutdown().await;
    debug!("Write task ended, {} connections remain", permit.active() - 1);
    drop(permit);
}
