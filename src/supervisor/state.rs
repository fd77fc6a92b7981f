//! Listener connection state machine.
//!
//! ```text
//!                 connect                handshake ok
//! Disconnected ──────────▶ Connecting ────────────────▶ Live ──┐ event
//!      ▲                        │                        │  ◀──┘
//!      │ channel closed         │ handshake fail/timeout │ silence timeout
//!      └────────────────────────┼────────────────────────┤
//!                               ▼                        ▼
//!                          Simulating ◀──────────────────┘
//!                               │ connect (user forced)
//!                               └──────────▶ Connecting
//!
//! any state ── user disconnect ──▶ Disconnected
//! ```
//!
//! [`ConnectionState::on`] is a pure function; triggers that do not apply to
//! the current state leave it unchanged.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Live,
    /// Degraded mode: locally scripted subtitles, visibly not live.
    Simulating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// User asked to connect, or the retry backoff elapsed.
    Connect,
    HandshakeOk,
    HandshakeFailed,
    HandshakeTimeout,
    EventReceived,
    ChannelClosed,
    /// A live channel stayed silent past the configured limit.
    SilenceTimeout,
    UserDisconnect,
}

impl ConnectionState {
    pub fn on(self, trigger: Trigger) -> ConnectionState {
        use ConnectionState::*;
        use Trigger::*;

        match (self, trigger) {
            (_, UserDisconnect) => Disconnected,
            (Disconnected, Connect) => Connecting,
            (Connecting, HandshakeOk) => Live,
            (Connecting, HandshakeFailed | HandshakeTimeout) => Simulating,
            (Live, EventReceived) => Live,
            (Live, ChannelClosed) => Disconnected,
            (Live, SilenceTimeout) => Simulating,
            (Simulating, Connect) => Connecting,
            (state, _) => state,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Live => "Live",
            ConnectionState::Simulating => "Simulated",
        }
    }

    /// Whether content shown in this state comes from the real broadcast.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Live)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
