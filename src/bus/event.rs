//! Subtitle events and their wire payload.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::room::RoomId;

/// One immutable subtitle line for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEvent {
    pub room: RoomId,
    pub text: String,
    /// Epoch milliseconds on the source clock.
    pub timestamp: u64,
    /// Monotonic per room, starting at 1.
    pub sequence: u64,
}

/// An event handed to one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleDelivery {
    pub event: SubtitleEvent,
    /// Events this subscription missed immediately before `event`.
    /// Non-zero marks a discontinuity.
    pub dropped_before: u64,
}

impl SubtitleDelivery {
    /// `SubscriptionOverflow` when events were lost before this one.
    pub fn discontinuity(&self) -> Option<ErrorKind> {
        (self.dropped_before > 0).then_some(ErrorKind::SubscriptionOverflow)
    }
}

/// JSON message sent to listeners, one per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitlePayload {
    pub room: RoomId,
    pub text: String,
    pub timestamp: u64,
    pub sequence: u64,
    #[serde(default)]
    pub dropped: u64,
}

impl From<&SubtitleDelivery> for SubtitlePayload {
    fn from(delivery: &SubtitleDelivery) -> Self {
        let event = &delivery.event;
        Self {
            room: event.room,
            text: event.text.clone(),
            timestamp: event.timestamp,
            sequence: event.sequence,
            dropped: delivery.dropped_before,
        }
    }
}

impl From<&SubtitleEvent> for SubtitlePayload {
    fn from(event: &SubtitleEvent) -> Self {
        Self {
            room: event.room,
            text: event.text.clone(),
            timestamp: event.timestamp,
            sequence: event.sequence,
            dropped: 0,
        }
    }
}

impl From<SubtitlePayload> for SubtitleEvent {
    fn from(payload: SubtitlePayload) -> Self {
        Self {
            room: payload.room,
            text: payload.text,
            timestamp: payload.timestamp,
            sequence: payload.sequence,
        }
    }
}

/// JSON body of `GET /subtitles/{room}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestSubtitle {
    pub room: RoomId,
    pub latest: Option<SubtitlePayload>,
}
