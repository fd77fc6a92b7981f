//! Per-listener session context.
//!
//! A [`ListenerSession`] holds everything one listener's connection needs:
//! the room, whether the user wants to be connected, whether a retry is due,
//! the last live sequence seen and the current state.  Each supervisor owns
//! exactly one session; there is no process-wide connection state.

use super::state::{ConnectionState, Trigger};
use crate::room::RoomId;

#[derive(Debug, Clone)]
pub struct ListenerSession {
    room: RoomId,
    state: ConnectionState,
    /// Cleared by an explicit user disconnect; suppresses auto-retry.
    wants_connection: bool,
    /// Set when a live channel closed underneath us.
    retry_pending: bool,
    last_sequence: Option<u64>,
    /// Set by a handshake until the first live event arrives.
    fresh_channel: bool,
}

impl ListenerSession {
    pub fn new(room: RoomId) -> Self {
        Self {
            room,
            state: ConnectionState::Disconnected,
            wants_connection: false,
            retry_pending: false,
            last_sequence: None,
            fresh_channel: false,
        }
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn wants_connection(&self) -> bool {
        self.wants_connection
    }

    /// `true` when the supervisor should reconnect after its backoff.
    pub fn should_retry(&self) -> bool {
        self.wants_connection && self.retry_pending
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Apply `trigger`; returns the new state if it changed.
    pub fn apply(&mut self, trigger: Trigger) -> Option<ConnectionState> {
        match trigger {
            Trigger::Connect => {
                self.wants_connection = true;
                self.retry_pending = false;
            }
            Trigger::UserDisconnect => {
                self.wants_connection = false;
                self.retry_pending = false;
            }
            Trigger::ChannelClosed if self.state == ConnectionState::Live => {
                self.retry_pending = true;
            }
            Trigger::HandshakeOk => self.fresh_channel = true,
            _ => {}
        }

        let next = self.state.on(trigger);
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }

    /// Record a live event's sequence.  Returns how many were skipped since
    /// the previous one, or `None` for a stale or duplicate event.
    ///
    /// The first event on a new channel is never stale: the channel already
    /// resumed after `last_sequence`, so a lower number means the server
    /// restarted its numbering and the session follows it.
    pub fn observe(&mut self, sequence: u64) -> Option<u64> {
        let fresh = std::mem::take(&mut self.fresh_channel);
        let missed = match self.last_sequence {
            Some(last) if sequence <= last && fresh => {
                log::debug!("supervisor[{}]: sequence restarted at {sequence}", self.room);
                0
            }
            Some(last) if sequence <= last => return None,
            Some(last) => sequence - last - 1,
            None => 0,
        };
        self.last_sequence = Some(sequence);
        Some(missed)
    }
}
