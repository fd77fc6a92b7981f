//! Per-room processing pipelines.
//!
//! # Architecture
//!
//! ```text
//! FrameReceiver(room)
//!        │
//!        ▼
//! PipelineRunner::run()  ← one tokio task per room
//!        │
//!        ├─ [zh]     TrackSink::push(original audio)
//!        ├─ Transcriber::transcribe         (timeout)
//!        │     └─ empty → heartbeat only
//!        ├─ [kr, vn] Translator::translate  (timeout)
//!        ├─ [kr, vn] Synthesizer::synthesize (timeout) → TrackSink::push
//!        ├─ SubtitleBus::publish
//!        └─ HeartbeatMonitor::record_heartbeat
//!
//! failure → record last_error, skip heartbeat, next frame
//! 3 consecutive terminal failures → detach + Stopped
//! ```

pub mod runner;
pub mod state;

pub use runner::{PipelineDeps, PipelineRunner, RunningPipeline};
pub use state::{FailureTracker, StepOutcome, StopReason};
