//! Client session definition
//!
//! Represents one client's membership in one room: its id, lifecycle
//! status, and the channel to its connection's writer task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::Frame;
use crate::status::Status;
use crate::types::ClientId;

/// Handle used to write frames to a client's connection
pub type Outbound = mpsc::Sender<Frame>;

/// Registered client session
///
/// Exclusively owns its `outbound` sender: once the session is dropped
/// and no handler holds a clone, the connection is shut down.
#[derive(Debug)]
pub struct Session {
    /// Id within the owning room
    pub id: ClientId,
    /// Lifecycle status
    pub status: Status,
    /// Server → Client frame channel
    pub outbound: Outbound,
}

impl Session {
    /// Create a new session in the `NEW` state
    pub fn new(id: ClientId, outbound: Outbound) -> Self {
        Self {
            id,
            status: Status::New,
            outbound,
        }
    }

    /// Queue a frame for this client without waiting
    ///
    /// Fails if the connection is gone or its buffer is full; a stalled
    /// reader never holds up the caller.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Whether broadcasts are currently delivered to this session
    pub fn is_listening(&self) -> bool {
        self.status.receives_broadcasts()
    }

    /// Apply the effect of the client sending a message
    ///
    /// Returns the new status, or `None` if the session cannot send.
    pub fn record_send(&mut self) -> Option<Status> {
        let next = self.status.after_send()?;
        self.status = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        let session = Session::new(ClientId::from("alice"), tx);
        drop(rx);
        assert!(matches!(
            session.send(Frame::msg("hi")),
            Err(SendError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_delivers_frame() {
        let (tx, mut rx) = mpsc::channel(1);
        let session = Session::new(ClientId::from("alice"), tx);
        session.send(Frame::msg("hi")).unwrap();
        assert_eq!(rx.recv().await, Some(Frame::msg("hi")));
    }

    #[test]
    fn test_send_to_full_buffer_does_not_wait() {
        let (tx, _rx) = mpsc::channel(1);
        let session = Session::new(ClientId::from("alice"), tx);
        session.send(Frame::msg("first")).unwrap();
        assert!(matches!(
            session.send(Frame::msg("second")),
            Err(SendError::Full)
        ));
    }

    #[test]
    fn test_record_send_advances() {
        let (tx, _rx) = mpsc::channel(1);
        let mut session = Session::new(ClientId::from("alice"), tx);
        assert!(!session.is_listening());
        assert_eq!(session.record_send(), Some(Status::Connected));
        assert!(session.is_listening());
        assert_eq!(session.record_send(), Some(Status::Active));
        session.status = Status::Paused;
        assert!(!session.is_listening());
        assert_eq!(session.record_send(), Some(Status::Active));
    }
}
