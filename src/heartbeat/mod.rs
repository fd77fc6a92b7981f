//! Per-room liveness tracking.
//!
//! Every [`PipelineRunner`](crate::pipeline::PipelineRunner) owns the write
//! side of exactly one room's cell: it records a heartbeat after each
//! completed step (and on idle ticks), its last error, and its lifecycle.
//! Readers (the status endpoint, the orchestrator) only load atomics, so a
//! status request never waits on a pipeline.
//!
//! A room is *alive* when `now - last_heartbeat < window`.  A room that has
//! never heartbeated is not alive.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::room::RoomId;

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Coarse lifecycle of a room's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// No pipeline has been started for the room.
    Idle,
    /// A pipeline is attached and processing frames.
    Running,
    /// The pipeline exited (requested stop or repeated terminal failures).
    Stopped,
}

impl Lifecycle {
    fn to_code(self) -> u8 {
        match self {
            Lifecycle::Idle => 0,
            Lifecycle::Running => 1,
            Lifecycle::Stopped => 2,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => Lifecycle::Running,
            2 => Lifecycle::Stopped,
            _ => Lifecycle::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomCell
// ---------------------------------------------------------------------------

/// Lock-free state for one room.  `0` encodes "never" / "none".
#[derive(Debug, Default)]
struct RoomCell {
    last_heartbeat: AtomicU64,
    last_error: AtomicU8,
    lifecycle: AtomicU8,
}

/// Point-in-time copy of one room's cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineState {
    pub room: RoomId,
    /// Epoch milliseconds of the newest heartbeat, if any.
    pub last_heartbeat: Option<u64>,
    pub last_error: Option<ErrorKind>,
    pub lifecycle: Lifecycle,
    pub alive: bool,
}

// ---------------------------------------------------------------------------
// HeartbeatMonitor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct HeartbeatMonitor {
    cells: [RoomCell; 3],
    window: Duration,
}

impl HeartbeatMonitor {
    /// `window` is the liveness threshold (60 s in production).
    pub fn new(window: Duration) -> Self {
        Self {
            cells: Default::default(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn cell(&self, room: RoomId) -> &RoomCell {
        &self.cells[room.index()]
    }

    /// Record a heartbeat at epoch millis `at`.
    ///
    /// Heartbeats never move backwards: an older timestamp is ignored.
    pub fn record_heartbeat(&self, room: RoomId, at: u64) {
        self.cell(room).last_heartbeat.fetch_max(at, Ordering::AcqRel);
    }

    pub fn record_error(&self, room: RoomId, kind: ErrorKind) {
        self.cell(room)
            .last_error
            .store(kind.to_code(), Ordering::Release);
    }

    pub fn set_lifecycle(&self, room: RoomId, lifecycle: Lifecycle) {
        self.cell(room)
            .lifecycle
            .store(lifecycle.to_code(), Ordering::Release);
    }

    pub fn last_heartbeat(&self, room: RoomId) -> Option<u64> {
        match self.cell(room).last_heartbeat.load(Ordering::Acquire) {
            0 => None,
            at => Some(at),
        }
    }

    pub fn last_error(&self, room: RoomId) -> Option<ErrorKind> {
        ErrorKind::from_code(self.cell(room).last_error.load(Ordering::Acquire))
    }

    pub fn lifecycle(&self, room: RoomId) -> Lifecycle {
        Lifecycle::from_code(self.cell(room).lifecycle.load(Ordering::Acquire))
    }

    /// `true` iff the room heartbeated strictly less than `window` before `now`.
    pub fn is_alive(&self, room: RoomId, now: u64) -> bool {
        match self.last_heartbeat(room) {
            Some(at) => u128::from(now.saturating_sub(at)) < self.window.as_millis(),
            None => false,
        }
    }

    /// Copy of the room's cell evaluated at `now`.
    pub fn state(&self, room: RoomId, now: u64) -> PipelineState {
        PipelineState {
            room,
            last_heartbeat: self.last_heartbeat(room),
            last_error: self.last_error(room),
            lifecycle: self.lifecycle(room),
            alive: self.is_alive(room, now),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn monitor() -> HeartbeatMonitor {
        HeartbeatMonitor::new(Duration::from_secs(60))
    }

    #[test]
    fn never_heartbeated_room_is_not_alive() {
        let m = monitor();
        assert!(!m.is_alive(RoomId::Kr, T0));
        assert_eq!(m.last_heartbeat(RoomId::Kr), None);
        assert_eq!(m.lifecycle(RoomId::Kr), Lifecycle::Idle);
    }

    #[test]
    fn liveness_boundary_is_strict() {
        let m = monitor();
        m.record_heartbeat(RoomId::Kr, T0);

        assert!(m.is_alive(RoomId::Kr, T0 + 59_999));
        assert!(!m.is_alive(RoomId::Kr, T0 + 60_000));
        assert!(!m.is_alive(RoomId::Kr, T0 + 61_000));
    }

    #[test]
    fn heartbeat_never_moves_backwards() {
        let m = monitor();
        m.record_heartbeat(RoomId::Vn, T0 + 10);
        m.record_heartbeat(RoomId::Vn, T0);
        assert_eq!(m.last_heartbeat(RoomId::Vn), Some(T0 + 10));
    }

    #[test]
    fn clock_behind_heartbeat_counts_as_alive() {
        let m = monitor();
        m.record_heartbeat(RoomId::Zh, T0);
        assert!(m.is_alive(RoomId::Zh, T0 - 5));
    }

    #[test]
    fn rooms_are_independent() {
        let m = monitor();
        m.record_heartbeat(RoomId::Zh, T0);
        m.record_error(RoomId::Kr, ErrorKind::CollaboratorTimeout);
        m.set_lifecycle(RoomId::Vn, Lifecycle::Stopped);

        let zh = m.state(RoomId::Zh, T0 + 1);
        assert!(zh.alive);
        assert_eq!(zh.last_error, None);

        let kr = m.state(RoomId::Kr, T0 + 1);
        assert!(!kr.alive);
        assert_eq!(kr.last_error, Some(ErrorKind::CollaboratorTimeout));

        assert_eq!(m.lifecycle(RoomId::Vn), Lifecycle::Stopped);
        assert_eq!(m.lifecycle(RoomId::Zh), Lifecycle::Idle);
    }
}
