//! Scripted collaborator doubles for tests.
//!
//! Each double pops the next scripted result per call and falls back to a
//! fixed result once the script is exhausted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{CollaboratorError, Stage, Synthesizer, TrackSink, Transcriber, Translator};
use crate::audio::AudioFrame;
use crate::room::{Language, RoomId};

pub struct Script<T> {
    steps: Mutex<VecDeque<Result<T, CollaboratorError>>>,
    fallback: Result<T, CollaboratorError>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    pub fn new(steps: Vec<Result<T, CollaboratorError>>, fallback: Result<T, CollaboratorError>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Result<T, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn unavailable(stage: Stage) -> CollaboratorError {
    CollaboratorError::unavailable(stage, "connection refused")
}

pub fn failure(stage: Stage) -> CollaboratorError {
    CollaboratorError::failure(stage, "bad response")
}

// ---------------------------------------------------------------------------
// MockTranscriber
// ---------------------------------------------------------------------------

pub struct MockTranscriber {
    pub script: Script<String>,
    delay: Option<Duration>,
}

impl MockTranscriber {
    /// Always recognises `text`.
    pub fn ok(text: &str) -> Self {
        Self::scripted(vec![], Ok(text.to_string()))
    }

    pub fn scripted(
        steps: Vec<Result<String, CollaboratorError>>,
        fallback: Result<String, CollaboratorError>,
    ) -> Self {
        Self {
            script: Script::new(steps, fallback),
            delay: None,
        }
    }

    /// Sleeps `delay` before answering.
    pub fn slow(delay: Duration, text: &str) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok(text)
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _frame: &AudioFrame) -> Result<String, CollaboratorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script.next()
    }
}

// ---------------------------------------------------------------------------
// MockTranslator
// ---------------------------------------------------------------------------

/// Echoes `"[<lang>] <text>"` unless the script says otherwise.
pub struct MockTranslator {
    pub script: Script<()>,
}

impl MockTranslator {
    pub fn echo() -> Self {
        Self::scripted(vec![])
    }

    pub fn scripted(steps: Vec<Result<(), CollaboratorError>>) -> Self {
        Self {
            script: Script::new(steps, Ok(())),
        }
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, target: Language) -> Result<String, CollaboratorError> {
        self.script.next()?;
        Ok(format!("[{}] {}", target.code(), text))
    }
}

// ---------------------------------------------------------------------------
// MockSynthesizer
// ---------------------------------------------------------------------------

/// Returns the text's UTF-8 bytes as "audio".
pub struct MockSynthesizer {
    pub script: Script<()>,
}

impl MockSynthesizer {
    pub fn ok() -> Self {
        Self::scripted(vec![])
    }

    pub fn scripted(steps: Vec<Result<(), CollaboratorError>>) -> Self {
        Self {
            script: Script::new(steps, Ok(())),
        }
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _target: Language) -> Result<Bytes, CollaboratorError> {
        self.script.next()?;
        Ok(Bytes::copy_from_slice(text.as_bytes()))
    }
}

// ---------------------------------------------------------------------------
// RecordingTracks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingTracks {
    pushed: Mutex<Vec<(RoomId, Bytes)>>,
}

impl RecordingTracks {
    pub fn for_room(&self, room: RoomId) -> Vec<Bytes> {
        self.pushed
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == room)
            .map(|(_, audio)| audio.clone())
            .collect()
    }
}

impl TrackSink for RecordingTracks {
    fn push(&self, room: RoomId, audio: Bytes) {
        self.pushed.lock().unwrap().push((room, audio));
    }
}
