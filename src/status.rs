//! Per-client lifecycle states
//!
//! `NEW → CONNECTED → ACTIVE`, `ACTIVE ⇄ PAUSED`, and any live state may
//! move to `ERROR` or `CLOSING`, both of which end in `CLOSED`.

use serde::Serialize;

/// Lifecycle status of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Registered, has not sent anything yet
    New,
    /// Sent one message
    Connected,
    /// Sent two or more messages, or woke up from a pause
    Active,
    /// Paused by request; still registered but receives nothing
    Paused,
    /// Reserved; no command currently suspends a client
    Suspended,
    /// Reported an error; about to be closed
    Error,
    /// Farewell in progress
    Closing,
    /// Terminal
    Closed,
}

impl Status {
    /// Whether broadcasts are delivered to a session in this state
    pub fn receives_broadcasts(self) -> bool {
        matches!(self, Status::Connected | Status::Active)
    }

    /// Whether the session is still part of normal traffic
    pub fn is_live(self) -> bool {
        !matches!(self, Status::Error | Status::Closing | Status::Closed)
    }

    /// Transition table
    ///
    /// Pausing is accepted from every live state, and a send wakes a paused
    /// client straight back to `Active`.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (Closed, _) => false,
            (New, Connected) | (Connected, Active) | (Active, Active) => true,
            (Paused, Active) => true,
            (from, Paused) => from.is_live(),
            (from, Error) | (from, Closing) => from.is_live(),
            (Error, Closed) | (Closing, Closed) => true,
            _ => false,
        }
    }

    /// State after the client sends a message
    ///
    /// Returns `None` if the session may not send from its current state.
    pub fn after_send(self) -> Option<Status> {
        match self {
            Status::New => Some(Status::Connected),
            Status::Connected | Status::Active | Status::Paused => Some(Status::Active),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::Connected => "CONNECTED",
            Status::Active => "ACTIVE",
            Status::Paused => "PAUSED",
            Status::Suspended => "SUSPENDED",
            Status::Error => "ERROR",
            Status::Closing => "CLOSING",
            Status::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
