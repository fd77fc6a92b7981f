//! Crate-wide error taxonomy.
//!
//! Each subsystem has its own `thiserror` enum (`CollaboratorError`,
//! `FanoutError`, `TransportError`).  [`ErrorKind`] is the flat classification
//! shared by all of them; it is what a pipeline stores as its `last_error` and
//! what the status endpoint reports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat classification of every failure the orchestrator can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A collaborator call exceeded its caller-supplied timeout.
    CollaboratorTimeout,
    /// A collaborator answered with an error that may clear on the next frame.
    CollaboratorFailure,
    /// A collaborator could not be reached or refused the request outright.
    CollaboratorUnavailable,
    /// A delivery channel closed underneath a listener.
    ChannelClosed,
    /// A subscriber fell behind and lost its oldest pending events.
    SubscriptionOverflow,
    /// A second pipeline tried to attach to an already attached room.
    DuplicateRoomAttach,
}

impl ErrorKind {
    /// Terminal-leaning failures count towards stopping a pipeline.
    ///
    /// A timeout or an unreachable collaborator tends to repeat on the next
    /// frame; a plain failure is usually specific to one frame.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ErrorKind::CollaboratorTimeout | ErrorKind::CollaboratorUnavailable
        )
    }

    /// Stable snake_case label.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::CollaboratorTimeout => "collaborator_timeout",
            ErrorKind::CollaboratorFailure => "collaborator_failure",
            ErrorKind::CollaboratorUnavailable => "collaborator_unavailable",
            ErrorKind::ChannelClosed => "channel_closed",
            ErrorKind::SubscriptionOverflow => "subscription_overflow",
            ErrorKind::DuplicateRoomAttach => "duplicate_room_attach",
        }
    }

    /// Single-byte encoding for lock-free state cells.  `0` means "none".
    pub(crate) fn to_code(self) -> u8 {
        match self {
            ErrorKind::CollaboratorTimeout => 1,
            ErrorKind::CollaboratorFailure => 2,
            ErrorKind::CollaboratorUnavailable => 3,
            ErrorKind::ChannelClosed => 4,
            ErrorKind::SubscriptionOverflow => 5,
            ErrorKind::DuplicateRoomAttach => 6,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorKind::CollaboratorTimeout),
            2 => Some(ErrorKind::CollaboratorFailure),
            3 => Some(ErrorKind::CollaboratorUnavailable),
            4 => Some(ErrorKind::ChannelClosed),
            5 => Some(ErrorKind::SubscriptionOverflow),
            6 => Some(ErrorKind::DuplicateRoomAttach),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
