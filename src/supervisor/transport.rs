//! Listener-side subtitle transports.
//!
//! A [`SubtitleTransport`] performs the handshake for a room and hands back a
//! [`SubtitleChannel`] that yields live events until it closes.
//! [`LocalBusTransport`] talks to an in-process [`SubtitleBus`];
//! [`HttpPollTransport`](super::HttpPollTransport) polls a remote server.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::bus::{SubtitleBus, SubtitleEvent, SubtitleFeed};
use crate::error::ErrorKind;
use crate::room::RoomId;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("handshake for room {room} failed: {reason}")]
    Handshake { room: RoomId, reason: String },

    #[error("channel for room {0} is closed")]
    Closed(RoomId),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Closed(_) => ErrorKind::ChannelClosed,
            TransportError::Handshake { .. } | TransportError::Http(_) => {
                ErrorKind::CollaboratorUnavailable
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SubtitleTransport: Send + Sync {
    /// Handshake for `room`, resuming after `resume_after` when known.
    async fn connect(
        &self,
        room: RoomId,
        resume_after: Option<u64>,
    ) -> Result<Box<dyn SubtitleChannel>, TransportError>;
}

#[async_trait]
pub trait SubtitleChannel: Send {
    /// Next live event, or `None` once the channel has closed.
    async fn recv(&mut self) -> Option<SubtitleEvent>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SubtitleTransport>, _: Box<dyn SubtitleChannel>) {}
};

// ---------------------------------------------------------------------------
// LocalBusTransport
// ---------------------------------------------------------------------------

/// In-process transport over a shared [`SubtitleBus`].
pub struct LocalBusTransport {
    bus: Arc<SubtitleBus>,
}

impl LocalBusTransport {
    pub fn new(bus: Arc<SubtitleBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl SubtitleTransport for LocalBusTransport {
    async fn connect(
        &self,
        room: RoomId,
        resume_after: Option<u64>,
    ) -> Result<Box<dyn SubtitleChannel>, TransportError> {
        Ok(Box::new(BusChannel {
            feed: self.bus.subscribe_after(room, resume_after),
        }))
    }
}

struct BusChannel {
    feed: SubtitleFeed,
}

#[async_trait]
impl SubtitleChannel for BusChannel {
    async fn recv(&mut self) -> Option<SubtitleEvent> {
        self.feed.next().await.map(|delivery| delivery.event)
    }
}
