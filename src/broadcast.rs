//! Room fan-out
//!
//! Delivers one `MSG` frame to every listening member of a room. A failed
//! recipient (gone, or not reading) is logged and recorded but stays
//! registered. Delivery never waits on a recipient.

use tracing::{debug, info, warn};

use crate::message::Frame;
use crate::room::Room;
use crate::types::ClientId;

/// Outcome of one broadcast
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose connection accepted the frame
    pub delivered: Vec<ClientId>,
    /// Recipients whose connection was gone or backed up
    pub failed: Vec<ClientId>,
}

impl BroadcastReport {
    pub fn recipients(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Send `MSG <body>` to every `CONNECTED`/`ACTIVE` member of `room`
pub fn broadcast(room: &Room, body: &str) -> BroadcastReport {
    let frame = Frame::msg(body);
    let mut report = BroadcastReport::default();

    for session in room.listeners() {
        match session.send(frame.clone()) {
            Ok(()) => report.delivered.push(session.id.clone()),
            Err(e) => {
                warn!(
                    "Failed to deliver to client {} in room {}: {}",
                    session.id, room.name, e
                );
                report.failed.push(session.id.clone());
            }
        }
    }

    if !report.failed.is_empty() {
        // Failed sessions stay registered until QUIT or PAUSE
        info!(
            "{} failed connections left in room {}",
            report.failed.len(),
            room.name
        );
    }
    debug!(
        "Broadcast to room {}: {} delivered",
        room.name,
        report.delivered.len()
    );

    report
}
