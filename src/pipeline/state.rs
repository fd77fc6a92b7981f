//! Per-pipeline bookkeeping: step outcomes, failure streaks, stop reasons.

use std::fmt;

use crate::bus::SubtitleEvent;
use crate::error::ErrorKind;

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// Result of one successful trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Speech was recognised and a subtitle published.
    Subtitle(SubtitleEvent),
    /// The frame held no speech.  Still counts as a heartbeat.
    Silence,
}

// ---------------------------------------------------------------------------
// StopReason
// ---------------------------------------------------------------------------

/// Why a pipeline's loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// Too many consecutive terminal collaborator failures.
    TerminalFailures,
    /// The dispatcher closed the room's mailbox.
    Detached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Requested => "stop requested",
            StopReason::TerminalFailures => "repeated terminal failures",
            StopReason::Detached => "detached from dispatcher",
        })
    }
}

// ---------------------------------------------------------------------------
// FailureTracker
// ---------------------------------------------------------------------------

/// Counts consecutive terminal failures.
///
/// ```text
/// success            → streak = 0
/// terminal failure   → streak += 1   (stop when streak == threshold)
/// transient failure  → streak unchanged
/// ```
#[derive(Debug, Clone)]
pub struct FailureTracker {
    streak: u32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            streak: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn record_success(&mut self) {
        self.streak = 0;
    }

    /// Returns `true` when the pipeline should stop.
    pub fn record_failure(&mut self, kind: ErrorKind) -> bool {
        if kind.is_terminal() {
            self.streak += 1;
        }
        self.streak >= self.threshold
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}
