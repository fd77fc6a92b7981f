//! Subtitle bus: ordered per-room publish/subscribe.
//!
//! # Architecture
//!
//! ```text
//! PipelineRunner(kr) ──publish──▶ RoomChannel(kr) ──┬──▶ SubscriptionQueue ──▶ SubtitleFeed (ws listener)
//!                                 ├ next sequence   ├──▶ SubscriptionQueue ──▶ SubtitleFeed (ws listener)
//!                                 └ latest event    └──▶ ...
//! ```
//!
//! `publish` takes the room's lock, assigns the next sequence number, stores
//! the event as the room's latest and appends it to every subscription's
//! bounded queue.  Sequence assignment and enqueueing happen under the same
//! lock, so concurrent publishers to one room still produce a single total
//! order that every subscriber observes.
//!
//! A lagging subscription loses its *oldest* pending events; the next event
//! it receives carries `dropped_before > 0`.

mod event;
mod feed;

pub use event::{LatestSubtitle, SubtitleDelivery, SubtitleEvent, SubtitlePayload};
pub use feed::SubtitleFeed;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::room::RoomId;
use feed::SubscriptionQueue;

// ---------------------------------------------------------------------------
// RoomChannel
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ChannelState {
    next_sequence: u64,
    latest: Option<SubtitleEvent>,
    subscribers: HashMap<u64, Arc<SubscriptionQueue>>,
    next_subscriber: u64,
}

#[derive(Debug)]
pub(crate) struct RoomChannel {
    room: RoomId,
    state: Mutex<ChannelState>,
}

impl RoomChannel {
    fn new(room: RoomId) -> Self {
        Self {
            room,
            state: Mutex::new(ChannelState {
                next_sequence: 1,
                ..ChannelState::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn remove_subscriber(&self, id: u64) {
        if self.lock().subscribers.remove(&id).is_some() {
            log::debug!("bus[{}]: subscriber {id} left", self.room);
        }
    }
}

// ---------------------------------------------------------------------------
// SubtitleBus
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SubtitleBus {
    channels: [Arc<RoomChannel>; 3],
    pending_capacity: usize,
    closed: AtomicBool,
}

impl SubtitleBus {
    /// `pending_capacity` bounds each subscription's undelivered events.
    pub fn new(pending_capacity: usize) -> Self {
        Self {
            channels: RoomId::ALL.map(|room| Arc::new(RoomChannel::new(room))),
            pending_capacity: pending_capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    fn channel(&self, room: RoomId) -> &Arc<RoomChannel> {
        &self.channels[room.index()]
    }

    /// Publish `text` for `room`, assigning the next sequence number.
    pub fn publish(&self, room: RoomId, text: impl Into<String>, timestamp: u64) -> SubtitleEvent {
        let channel = self.channel(room);
        let mut state = channel.lock();

        let event = SubtitleEvent {
            room,
            text: text.into(),
            timestamp,
            sequence: state.next_sequence,
        };
        state.next_sequence += 1;
        state.latest = Some(event.clone());

        for (id, queue) in &state.subscribers {
            if let Some(evicted) = queue.push(event.clone()) {
                log::debug!(
                    "bus[{room}]: subscriber {id} lagging, dropped event {}",
                    evicted.sequence
                );
            }
        }
        event
    }

    /// Subscribe to `room`, starting with its latest event if there is one.
    pub fn subscribe(&self, room: RoomId) -> SubtitleFeed {
        self.subscribe_after(room, None)
    }

    /// Subscribe to `room`, resuming after `last_seen`.
    ///
    /// The latest event is queued immediately when it is newer than
    /// `last_seen`.  Events published while disconnected are not replayed;
    /// the gap shows up in the first delivery's `dropped_before`.
    ///
    /// A `last_seen` beyond anything this bus has published (the listener
    /// saw a previous process) is dropped and the feed starts from scratch.
    pub fn subscribe_after(&self, room: RoomId, last_seen: Option<u64>) -> SubtitleFeed {
        let channel = self.channel(room);
        let queue = Arc::new(SubscriptionQueue::new(self.pending_capacity));

        let (id, last_seen) = {
            let mut state = channel.lock();
            // Checked under the room lock so it cannot interleave with `close`.
            if self.closed.load(Ordering::Acquire) {
                queue.close();
            }
            let id = state.next_subscriber;
            state.next_subscriber += 1;

            let newest = state.next_sequence.checked_sub(1).filter(|&seq| seq > 0);
            let resumed = resume_point(last_seen, newest);
            if resumed != last_seen {
                log::debug!(
                    "bus[{room}]: resume point {last_seen:?} is ahead of {newest:?}, starting over"
                );
            }
            let last_seen = resumed;

            if let Some(latest) = &state.latest {
                if last_seen.map_or(true, |seen| latest.sequence > seen) {
                    queue.push(latest.clone());
                }
            }
            state.subscribers.insert(id, Arc::clone(&queue));
            (id, last_seen)
        };
        log::debug!("bus[{room}]: subscriber {id} joined (after {last_seen:?})");

        SubtitleFeed::new(room, id, Arc::clone(channel), queue, last_seen)
    }

    /// Explicitly end a subscription.  Equivalent to dropping the feed.
    pub fn unsubscribe(&self, feed: SubtitleFeed) {
        drop(feed);
    }

    pub fn latest(&self, room: RoomId) -> Option<SubtitleEvent> {
        self.channel(room).lock().latest.clone()
    }

    pub fn subscriber_count(&self, room: RoomId) -> usize {
        self.channel(room).lock().subscribers.len()
    }

    /// End every feed.  Pending events are still delivered before `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for channel in &self.channels {
            for queue in channel.lock().subscribers.values() {
                queue.close();
            }
        }
    }
}

/// Where a resuming listener should continue, given the newest sequence the
/// source has published.  A resume point past `newest` belongs to a source
/// that has since restarted its numbering, so it is discarded.
pub fn resume_point(last_seen: Option<u64>, newest: Option<u64>) -> Option<u64> {
    last_seen.filter(|&seen| newest.is_some_and(|newest| seen <= newest))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
