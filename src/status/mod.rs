//! Status aggregation: heartbeat cells + room metadata → polled snapshot.
//!
//! ```text
//! HeartbeatMonitor ──(atomic loads)──▶ StatusReporter::snapshot ──▶ StatusResponse (JSON)
//!                                                                      │
//!                                           listener ◀── HealthVerdict::evaluate
//! ```
//!
//! Building a snapshot only reads atomics, so it never waits on a pipeline.

mod verdict;

pub use verdict::HealthVerdict;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::heartbeat::{HeartbeatMonitor, Lifecycle, PipelineState};
use crate::room::{Room, RoomId};

// ---------------------------------------------------------------------------
// RoomHealth
// ---------------------------------------------------------------------------

/// What a room's pipeline looks like from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomHealth {
    /// Never started.
    Idle,
    /// Attached and heartbeating within the window.
    Live,
    /// Attached but no heartbeat within the window.
    Stalled,
    /// Pipeline exited and is detached from the dispatcher.
    Stopped,
}

impl RoomHealth {
    pub fn of(state: &PipelineState) -> Self {
        match state.lifecycle {
            Lifecycle::Idle => RoomHealth::Idle,
            Lifecycle::Stopped => RoomHealth::Stopped,
            Lifecycle::Running if state.alive => RoomHealth::Live,
            Lifecycle::Running => RoomHealth::Stalled,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Typed snapshot of every room at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Epoch millis the snapshot was taken at.
    pub taken_at: u64,
    /// AND of `alive` over the required rooms.
    pub worker_alive: bool,
    /// Oldest heartbeat among the required rooms; `None` if any never beat.
    pub last_heartbeat: Option<u64>,
    pub rooms: BTreeMap<RoomId, RoomStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStatus {
    pub room_name: &'static str,
    pub display_name: String,
    pub alive: bool,
    pub health: RoomHealth,
    pub last_heartbeat: Option<u64>,
    pub last_error: Option<ErrorKind>,
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// JSON body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub worker_alive: bool,
    /// Epoch seconds; `0` when a required room never heartbeated.
    pub last_heartbeat: u64,
    pub rooms: RoomNames,
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineStatus>,
}

/// Room identifiers keyed by language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomNames {
    pub chinese: String,
    pub korean: String,
    pub vietnamese: String,
}

impl Default for RoomNames {
    fn default() -> Self {
        Self {
            chinese: RoomId::Zh.room_name().to_string(),
            korean: RoomId::Kr.room_name().to_string(),
            vietnamese: RoomId::Vn.room_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub alive: bool,
    pub state: RoomHealth,
    /// Epoch seconds, if the room ever heartbeated.
    pub last_heartbeat: Option<u64>,
    pub last_error: Option<ErrorKind>,
}

impl StatusSnapshot {
    pub fn to_response(&self) -> StatusResponse {
        let pipelines = self
            .rooms
            .iter()
            .map(|(id, room)| {
                (
                    id.as_str().to_string(),
                    PipelineStatus {
                        alive: room.alive,
                        state: room.health,
                        last_heartbeat: room.last_heartbeat.map(millis_to_secs),
                        last_error: room.last_error,
                    },
                )
            })
            .collect();

        StatusResponse {
            worker_alive: self.worker_alive,
            last_heartbeat: self.last_heartbeat.map(millis_to_secs).unwrap_or(0),
            rooms: RoomNames::default(),
            pipelines,
        }
    }
}

fn millis_to_secs(millis: u64) -> u64 {
    millis / 1_000
}

// ---------------------------------------------------------------------------
// StatusReporter
// ---------------------------------------------------------------------------

pub struct StatusReporter {
    monitor: Arc<HeartbeatMonitor>,
    rooms: Vec<Room>,
    required: Vec<RoomId>,
    clock: Arc<dyn Clock>,
}

impl StatusReporter {
    pub fn new(
        monitor: Arc<HeartbeatMonitor>,
        rooms: Vec<Room>,
        required: Vec<RoomId>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            monitor,
            rooms,
            required,
            clock,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot_at(self.clock.now_millis())
    }

    /// Snapshot evaluated at epoch millis `now`.
    pub fn snapshot_at(&self, now: u64) -> StatusSnapshot {
        let rooms: BTreeMap<RoomId, RoomStatus> = self
            .rooms
            .iter()
            .map(|room| {
                let state = self.monitor.state(room.id, now);
                (
                    room.id,
                    RoomStatus {
                        room_name: room.name(),
                        display_name: room.display_name.clone(),
                        alive: counts_as_alive(&state),
                        health: RoomHealth::of(&state),
                        last_heartbeat: state.last_heartbeat,
                        last_error: state.last_error,
                    },
                )
            })
            .collect();

        let worker_alive = self
            .required
            .iter()
            .all(|id| counts_as_alive(&self.monitor.state(*id, now)));

        let last_heartbeat = self
            .required
            .iter()
            .map(|id| self.monitor.last_heartbeat(*id))
            .collect::<Option<Vec<u64>>>()
            .and_then(|beats| beats.into_iter().min());

        StatusSnapshot {
            taken_at: now,
            worker_alive,
            last_heartbeat,
            rooms,
        }
    }
}

/// A recent heartbeat only counts while the pipeline is still running; a
/// stopped room is not alive however fresh its last beat.
fn counts_as_alive(state: &PipelineState) -> bool {
    state.alive && state.lifecycle == Lifecycle::Running
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    fn reporter(required: Vec<RoomId>) -> (Arc<HeartbeatMonitor>, StatusReporter) {
        let monitor = Arc::new(HeartbeatMonitor::new(Duration::from_secs(60)));
        let clock = Arc::new(ManualClock::new(T0));
        let reporter = StatusReporter::new(
            Arc::clone(&monitor),
            Room::catalogue(),
            required,
            clock,
        );
        (monitor, reporter)
    }

    fn run_all(monitor: &HeartbeatMonitor, at: u64) {
        for id in RoomId::ALL {
            monitor.set_lifecycle(id, Lifecycle::Running);
            monitor.record_heartbeat(id, at);
        }
    }

    #[test]
    fn worker_alive_requires_every_required_room() {
        let (monitor, reporter) = reporter(RoomId::ALL.to_vec());
        run_all(&monitor, T0);
        assert!(reporter.snapshot_at(T0 + 1_000).worker_alive);

        // kr goes quiet; the others keep beating.
        monitor.record_heartbeat(RoomId::Zh, T0 + 50_000);
        monitor.record_heartbeat(RoomId::Vn, T0 + 50_000);
        let snap = reporter.snapshot_at(T0 + 60_000);
        assert!(!snap.worker_alive);
        assert_eq!(snap.rooms[&RoomId::Kr].health, RoomHealth::Stalled);
        assert_eq!(snap.rooms[&RoomId::Zh].health, RoomHealth::Live);
        assert_eq!(snap.last_heartbeat, Some(T0));
    }

    #[test]
    fn unrequired_room_does_not_affect_aggregate() {
        let (monitor, reporter) = reporter(vec![RoomId::Zh]);
        monitor.set_lifecycle(RoomId::Zh, Lifecycle::Running);
        monitor.record_heartbeat(RoomId::Zh, T0);
        let snap = reporter.snapshot_at(T0 + 10);
        assert!(snap.worker_alive);
        assert_eq!(snap.rooms[&RoomId::Kr].health, RoomHealth::Idle);
    }

    #[test]
    fn stopped_is_reported_distinctly_from_stalled() {
        let (monitor, reporter) = reporter(RoomId::ALL.to_vec());
        run_all(&monitor, T0);
        monitor.set_lifecycle(RoomId::Vn, Lifecycle::Stopped);
        monitor.record_error(RoomId::Vn, ErrorKind::CollaboratorUnavailable);

        let snap = reporter.snapshot_at(T0 + 1_000);
        assert!(!snap.worker_alive);
        assert!(!snap.rooms[&RoomId::Vn].alive);
        assert!(snap.rooms[&RoomId::Kr].alive);
        assert!(!snap.to_response().pipelines["vn"].alive);

        let snap = reporter.snapshot_at(T0 + 120_000);
        assert_eq!(snap.rooms[&RoomId::Vn].health, RoomHealth::Stopped);
        assert_eq!(snap.rooms[&RoomId::Kr].health, RoomHealth::Stalled);
        assert_eq!(
            snap.rooms[&RoomId::Vn].last_error,
            Some(ErrorKind::CollaboratorUnavailable)
        );
    }

    #[test]
    fn never_started_rooms_report_no_heartbeat() {
        let (_monitor, reporter) = reporter(RoomId::ALL.to_vec());
        let snap = reporter.snapshot();
        assert!(!snap.worker_alive);
        assert_eq!(snap.last_heartbeat, None);
        assert_eq!(snap.to_response().last_heartbeat, 0);
    }

    #[test]
    fn response_uses_room_names_and_epoch_seconds() {
        let (monitor, reporter) = reporter(RoomId::ALL.to_vec());
        run_all(&monitor, T0 + 999);
        let response = reporter.snapshot_at(T0 + 2_000).to_response();

        assert!(response.worker_alive);
        assert_eq!(response.last_heartbeat, (T0 + 999) / 1_000);
        assert_eq!(response.rooms.chinese, "room_zh");
        assert_eq!(response.rooms.korean, "room_kr");
        assert_eq!(response.rooms.vietnamese, "room_vn");
        assert_eq!(response.pipelines["kr"].state, RoomHealth::Live);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["rooms"]["korean"], "room_kr");
        assert_eq!(json["pipelines"]["vn"]["state"], "live");
    }
}
