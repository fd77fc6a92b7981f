//! roomcast: one live speech stream broadcast into parallel language rooms.
//!
//! ```text
//! broadcaster ──/ingest──▶ Orchestrator ──▶ FanoutDispatcher ──▶ PipelineRunner × rooms
//!                                                                   │ STT → translate → TTS
//!                                                                   ▼
//! listeners ◀──/ws/{room}── SubtitleBus ◀───────────────────────────┘
//!                                HeartbeatMonitor ──▶ StatusReporter ──▶ /status
//! ```
//!
//! The listener side lives in [`supervisor`]: reconnect, then local
//! simulation when the live channel is unavailable.

pub mod audio;
pub mod buffer;
pub mod bus;
pub mod clock;
pub mod collab;
pub mod config;
pub mod error;
pub mod fanout;
pub mod heartbeat;
pub mod orchestrator;
pub mod pipeline;
pub mod room;
pub mod server;
pub mod status;
pub mod supervisor;
