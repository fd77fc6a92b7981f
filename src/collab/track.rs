//! Per-room output audio tracks.
//!
//! A pipeline hands every chunk of room audio (synthesised speech, or the
//! untouched original for the `zh` room) to a [`TrackSink`].  The WebRTC
//! publisher subscribes to [`BroadcastTracks`]; a deployment without one can
//! use [`DiscardTracks`].

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::room::RoomId;

/// Receives output audio for a room.  Must not block.
pub trait TrackSink: Send + Sync {
    fn push(&self, room: RoomId, audio: Bytes);
}

/// Drops all audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardTracks;

impl TrackSink for DiscardTracks {
    fn push(&self, _room: RoomId, _audio: Bytes) {}
}

/// Fans each room's audio out to any number of `broadcast` receivers.
///
/// A receiver that lags loses the oldest chunks (`RecvError::Lagged`).
#[derive(Debug)]
pub struct BroadcastTracks {
    senders: HashMap<RoomId, broadcast::Sender<Bytes>>,
}

impl BroadcastTracks {
    pub fn new(capacity: usize) -> Self {
        let senders = RoomId::ALL
            .into_iter()
            .map(|room| (room, broadcast::channel(capacity.max(1)).0))
            .collect();
        Self { senders }
    }

    pub fn subscribe(&self, room: RoomId) -> Option<broadcast::Receiver<Bytes>> {
        self.senders.get(&room).map(broadcast::Sender::subscribe)
    }
}

impl TrackSink for BroadcastTracks {
    fn push(&self, room: RoomId, audio: Bytes) {
        if let Some(tx) = self.senders.get(&room) {
            // No receivers is fine: nobody is listening to this room yet.
            let _ = tx.send(audio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn each_room_has_its_own_track() {
        let tracks = BroadcastTracks::new(4);
        let mut kr = tracks.subscribe(RoomId::Kr).unwrap();
        let mut vn = tracks.subscribe(RoomId::Vn).unwrap();

        tracks.push(RoomId::Kr, Bytes::from_static(b"kr-audio"));
        tracks.push(RoomId::Zh, Bytes::from_static(b"nobody"));

        assert_eq!(kr.recv().await.unwrap(), Bytes::from_static(b"kr-audio"));
        assert!(vn.try_recv().is_err());
    }

    #[test]
    fn discard_accepts_anything() {
        DiscardTracks.push(RoomId::Zh, Bytes::from_static(b"x"));
    }
}
