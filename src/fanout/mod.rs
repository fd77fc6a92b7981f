//! Audio fan-out: one broadcaster frame to every attached room pipeline.
//!
//! # Architecture
//!
//! ```text
//!                         ┌──▶ Mailbox(zh) ──▶ PipelineRunner(zh)
//! AudioFrame ──publish──▶ ├──▶ Mailbox(kr) ──▶ PipelineRunner(kr)
//!                         └──▶ Mailbox(vn) ──▶ PipelineRunner(vn)
//! ```
//!
//! Each mailbox is a bounded drop-oldest queue, so a slow room never holds up
//! the broadcaster or the other rooms.  [`FanoutDispatcher::publish`] is
//! synchronous and never waits.
//!
//! At most one pipeline may be attached to a room at a time.  Attaching
//! returns an [`AttachHandle`] carrying a generation id; detaching with a
//! stale handle (from a pipeline that was already replaced) is a no-op.

mod mailbox;

pub use mailbox::FrameReceiver;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::audio::AudioFrame;
use crate::error::ErrorKind;
use crate::room::RoomId;
use mailbox::Mailbox;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FanoutError {
    /// A pipeline is already attached to this room.
    #[error("room {0} already has an attached pipeline")]
    DuplicateRoomAttach(RoomId),
}

impl FanoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FanoutError::DuplicateRoomAttach(_) => ErrorKind::DuplicateRoomAttach,
        }
    }
}

// ---------------------------------------------------------------------------
// AttachHandle
// ---------------------------------------------------------------------------

/// Proof of attachment, required to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachHandle {
    room: RoomId,
    generation: u64,
}

impl AttachHandle {
    pub fn room(&self) -> RoomId {
        self.room
    }
}

#[derive(Debug)]
struct Attachment {
    generation: u64,
    mailbox: Arc<Mailbox>,
}

// ---------------------------------------------------------------------------
// FanoutDispatcher
// ---------------------------------------------------------------------------

/// Replicates each inbound [`AudioFrame`] to every attached room.
#[derive(Debug)]
pub struct FanoutDispatcher {
    rooms: RwLock<HashMap<RoomId, Attachment>>,
    mailbox_capacity: usize,
    next_generation: AtomicU64,
}

impl FanoutDispatcher {
    /// `mailbox_capacity` bounds each room's pending frames.
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            mailbox_capacity: mailbox_capacity.max(1),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Attach a pipeline to `room`.
    ///
    /// # Errors
    ///
    /// [`FanoutError::DuplicateRoomAttach`] if the room is already attached.
    pub fn attach(&self, room: RoomId) -> Result<(AttachHandle, FrameReceiver), FanoutError> {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        if rooms.contains_key(&room) {
            return Err(FanoutError::DuplicateRoomAttach(room));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mailbox = Arc::new(Mailbox::new(self.mailbox_capacity));
        rooms.insert(
            room,
            Attachment {
                generation,
                mailbox: Arc::clone(&mailbox),
            },
        );
        log::info!("fanout: attached room {room} (generation {generation})");

        Ok((
            AttachHandle { room, generation },
            FrameReceiver::new(room, mailbox),
        ))
    }

    /// Detach the pipeline identified by `handle`.
    ///
    /// Frames still queued for the room are dropped and its receiver yields
    /// `None`.  Returns `false` when the handle is stale.
    pub fn detach(&self, handle: AttachHandle) -> bool {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        match rooms.get(&handle.room) {
            Some(current) if current.generation == handle.generation => {}
            _ => return false,
        }
        if let Some(attachment) = rooms.remove(&handle.room) {
            attachment.mailbox.close();
            log::info!(
                "fanout: detached room {} ({} frames dropped over its lifetime)",
                handle.room,
                attachment.mailbox.dropped_total()
            );
        }
        true
    }

    /// Hand `frame` to every attached room.
    ///
    /// Never blocks and never fails; with no rooms attached the frame is
    /// discarded.  Returns the number of rooms that received it.
    pub fn publish(&self, frame: AudioFrame) -> usize {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0;
        for attachment in rooms.values() {
            if attachment.mailbox.offer(frame.clone()) {
                delivered += 1;
            }
        }
        if delivered == 0 {
            log::trace!("fanout: frame {} had no attached rooms", frame.sequence);
        }
        delivered
    }

    pub fn is_attached(&self, room: RoomId) -> bool {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&room)
    }

    /// Currently attached rooms, sorted.
    pub fn attached_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        rooms.sort();
        rooms
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(sequence: u64) -> AudioFrame {
        AudioFrame::new(sequence, sequence * 20, vec![sequence as u8; 4])
    }

    fn drain(rx: &mut FrameReceiver) -> Vec<u64> {
        std::iter::from_fn(|| rx.try_recv()).map(|f| f.sequence).collect()
    }

    // ---- attach / detach ---------------------------------------------------

    #[test]
    fn second_attach_to_same_room_is_rejected() {
        let d = FanoutDispatcher::new(8);
        let _first = d.attach(RoomId::Kr).unwrap();
        let err = d.attach(RoomId::Kr).unwrap_err();
        assert_eq!(err, FanoutError::DuplicateRoomAttach(RoomId::Kr));
        assert_eq!(err.kind(), ErrorKind::DuplicateRoomAttach);
    }

    #[test]
    fn stale_handle_does_not_detach_replacement() {
        let d = FanoutDispatcher::new(8);
        let (old, _rx) = d.attach(RoomId::Vn).unwrap();
        assert!(d.detach(old));

        let (_new, mut rx) = d.attach(RoomId::Vn).unwrap();
        assert!(!d.detach(old));
        assert!(d.is_attached(RoomId::Vn));

        d.publish(frame(1));
        assert_eq!(drain(&mut rx), vec![1]);
    }

    // ---- publish -----------------------------------------------------------

    #[test]
    fn one_frame_reaches_every_attached_room() {
        let d = FanoutDispatcher::new(8);
        let (_zh, mut zh) = d.attach(RoomId::Zh).unwrap();
        let (kr_handle, mut kr) = d.attach(RoomId::Kr).unwrap();
        let (_vn, mut vn) = d.attach(RoomId::Vn).unwrap();

        assert_eq!(d.publish(frame(1)), 3);
        assert_eq!(drain(&mut zh), vec![1]);
        assert_eq!(drain(&mut kr), vec![1]);
        assert_eq!(drain(&mut vn), vec![1]);

        assert!(d.detach(kr_handle));
        assert_eq!(d.publish(frame(2)), 2);
        assert_eq!(d.attached_rooms(), vec![RoomId::Zh, RoomId::Vn]);
        assert_eq!(drain(&mut zh), vec![2]);
        assert_eq!(drain(&mut vn), vec![2]);
    }

    #[test]
    fn publish_with_no_rooms_is_a_noop() {
        let d = FanoutDispatcher::new(8);
        assert_eq!(d.publish(frame(1)), 0);
    }

    #[test]
    fn slow_room_loses_oldest_frames_only() {
        let d = FanoutDispatcher::new(3);
        let (_h, mut rx) = d.attach(RoomId::Kr).unwrap();
        for seq in 1..=5 {
            d.publish(frame(seq));
        }
        assert_eq!(drain(&mut rx), vec![3, 4, 5]);
        assert_eq!(rx.dropped(), 2);
    }

    // ---- receiver ----------------------------------------------------------

    #[tokio::test]
    async fn recv_wakes_on_publish() {
        let d = Arc::new(FanoutDispatcher::new(8));
        let (_h, mut rx) = d.attach(RoomId::Zh).unwrap();

        let producer = Arc::clone(&d);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.publish(frame(7));
        });

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("frame should arrive");
        assert_eq!(got.map(|f| f.sequence), Some(7));
    }

    #[tokio::test]
    async fn recv_returns_none_after_detach() {
        let d = FanoutDispatcher::new(8);
        let (h, mut rx) = d.attach(RoomId::Vn).unwrap();
        d.publish(frame(1));
        d.detach(h);
        assert_eq!(rx.recv().await, None);
    }
}
