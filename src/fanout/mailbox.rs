//! Per-room bounded mailbox and its receiving half.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::audio::AudioFrame;
use crate::buffer::BoundedQueue;
use crate::room::RoomId;

/// Shared state between the dispatcher (producer) and one pipeline (consumer).
#[derive(Debug)]
pub(crate) struct Mailbox {
    queue: Mutex<BoundedQueue<AudioFrame>>,
    notify: Notify,
    closed: AtomicBool,
    dropped_total: AtomicU64,
}

impl Mailbox {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(BoundedQueue::new(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped_total: AtomicU64::new(0),
        }
    }

    /// Enqueue without waiting.  Returns `false` if the mailbox is closed.
    pub(crate) fn offer(&self, frame: AudioFrame) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let evicted = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame);
        if evicted.is_some() {
            self.dropped_total.fetch_add(1, Ordering::Relaxed);
        }
        // Stores a permit when the consumer is not parked yet.
        self.notify.notify_one();
        true
    }

    /// Close the mailbox and discard whatever is still queued.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.notify.notify_one();
    }

    pub(crate) fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    fn pop(&self) -> Option<AudioFrame> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Receiving half handed to the pipeline that attached to a room.
#[derive(Debug)]
pub struct FrameReceiver {
    room: RoomId,
    mailbox: Arc<Mailbox>,
}

impl FrameReceiver {
    pub(crate) fn new(room: RoomId, mailbox: Arc<Mailbox>) -> Self {
        Self { room, mailbox }
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Wait for the next frame.  Returns `None` once the room is detached.
    ///
    /// Cancel-safe: a frame is only removed from the mailbox when it is
    /// returned.
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        loop {
            if let Some(frame) = self.mailbox.pop() {
                return Some(frame);
            }
            if self.mailbox.is_closed() {
                return None;
            }
            self.mailbox.notify.notified().await;
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<AudioFrame> {
        self.mailbox.pop()
    }

    /// Frames evicted from this mailbox because the pipeline fell behind.
    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped_total()
    }
}
