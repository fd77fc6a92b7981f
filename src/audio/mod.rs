//! Broadcaster audio ingress.
//!
//! # Flow
//!
//! ```text
//! broadcaster ──bytes──▶ AudioIngest ──AudioFrame──▶ FanoutDispatcher ──▶ room mailboxes
//!                        (sequence + epoch timestamp)
//! ```
//!
//! Frames carry their payload as [`bytes::Bytes`], so fanning one frame out
//! to every room clones a reference count, not the audio.

pub mod frame;

pub use frame::{AudioFrame, AudioIngest};
