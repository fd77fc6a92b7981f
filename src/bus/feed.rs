//! Subscription queues and the consumer-facing feed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::event::{SubtitleDelivery, SubtitleEvent};
use super::RoomChannel;
use crate::buffer::BoundedQueue;
use crate::room::RoomId;

/// Pending events for one subscription.
#[derive(Debug)]
pub(crate) struct SubscriptionQueue {
    pending: Mutex<BoundedQueue<SubtitleEvent>>,
    notify: Notify,
    closed: AtomicBool,
}

impl SubscriptionQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(BoundedQueue::new(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue and wake the consumer.  Returns the evicted event, if any.
    pub(crate) fn push(&self, event: SubtitleEvent) -> Option<SubtitleEvent> {
        let evicted = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        self.notify.notify_one();
        evicted
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Pop the oldest event together with the evictions that preceded it.
    fn pop(&self) -> Option<(SubtitleEvent, u64)> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let event = pending.pop()?;
        Some((event, pending.take_dropped()))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A live subscription to one room.
///
/// Yields events in strictly increasing sequence order.  Dropping the feed
/// unsubscribes it.
pub struct SubtitleFeed {
    room: RoomId,
    id: u64,
    channel: Arc<RoomChannel>,
    queue: Arc<SubscriptionQueue>,
    last_delivered: Option<u64>,
}

impl SubtitleFeed {
    pub(crate) fn new(
        room: RoomId,
        id: u64,
        channel: Arc<RoomChannel>,
        queue: Arc<SubscriptionQueue>,
        resume_after: Option<u64>,
    ) -> Self {
        Self {
            room,
            id,
            channel,
            queue,
            last_delivered: resume_after,
        }
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Sequence of the last event this feed handed out (or resumed after).
    pub fn last_delivered_sequence(&self) -> Option<u64> {
        self.last_delivered
    }

    /// Wait for the next event.  Returns `None` once the bus shuts down.
    ///
    /// Cancel-safe: an event is only removed from the queue when returned.
    pub async fn next(&mut self) -> Option<SubtitleDelivery> {
        loop {
            if let Some(delivery) = self.try_next() {
                return Some(delivery);
            }
            if self.queue.is_closed() {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<SubtitleDelivery> {
        while let Some((event, evicted)) = self.queue.pop() {
            let dropped_before = match self.last_delivered {
                Some(last) if event.sequence <= last => continue,
                Some(last) => event.sequence - last - 1,
                None => evicted,
            };
            self.last_delivered = Some(event.sequence);
            return Some(SubtitleDelivery {
                event,
                dropped_before,
            });
        }
        None
    }
}

impl Drop for SubtitleFeed {
    fn drop(&mut self) {
        self.channel.remove_subscriber(self.id);
    }
}

impl std::fmt::Debug for SubtitleFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtitleFeed")
            .field("room", &self.room)
            .field("id", &self.id)
            .field("last_delivered", &self.last_delivered)
            .finish()
    }
}
