//! External collaborators: speech-to-text, translation, text-to-speech.
//!
//! Each collaborator is an async trait so the pipeline can hold it as
//! `Arc<dyn …>` and tests can swap in scripted doubles:
//!
//! * [`Transcriber`]: `transcribe(frame) -> text` ([`HttpTranscriber`])
//! * [`Translator`]: `translate(text, lang) -> text` ([`ApiTranslator`])
//! * [`Synthesizer`]: `synthesize(text, lang) -> audio` ([`HttpSynthesizer`])
//! * [`TrackSink`]: where a room's output audio goes ([`BroadcastTracks`])
//!
//! Callers bound every call with [`with_timeout`]; the HTTP clients also
//! carry their own request timeout from config.

pub mod prompt;
pub mod synthesize;
pub mod track;
pub mod transcribe;
pub mod translate;

#[cfg(test)]
pub mod mock;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::AppConfig;
use crate::error::ErrorKind;

pub use prompt::InterpreterPrompt;
pub use synthesize::{HttpSynthesizer, Synthesizer};
pub use track::{BroadcastTracks, DiscardTracks, TrackSink};
pub use transcribe::{HttpTranscriber, Transcriber};
pub use translate::{ApiTranslator, Translator};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Which collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcribe,
    Translate,
    Synthesize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::Synthesize => "synthesize",
        })
    }
}

// ---------------------------------------------------------------------------
// CollaboratorError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The call did not complete in time.
    #[error("{stage} timed out")]
    Timeout { stage: Stage },

    /// The collaborator answered, but not usefully.  Likely frame-specific.
    #[error("{stage} failed: {reason}")]
    Failure { stage: Stage, reason: String },

    /// The collaborator could not be reached or refused us.
    #[error("{stage} unavailable: {reason}")]
    Unavailable { stage: Stage, reason: String },
}

impl CollaboratorError {
    pub fn failure(stage: Stage, reason: impl Into<String>) -> Self {
        CollaboratorError::Failure {
            stage,
            reason: reason.into(),
        }
    }

    pub fn unavailable(stage: Stage, reason: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            stage,
            reason: reason.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            CollaboratorError::Timeout { stage }
            | CollaboratorError::Failure { stage, .. }
            | CollaboratorError::Unavailable { stage, .. } => *stage,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CollaboratorError::Timeout { .. } => ErrorKind::CollaboratorTimeout,
            CollaboratorError::Failure { .. } => ErrorKind::CollaboratorFailure,
            CollaboratorError::Unavailable { .. } => ErrorKind::CollaboratorUnavailable,
        }
    }

    /// Classify a `reqwest` error.
    ///
    /// | cause                     | variant       |
    /// |---------------------------|---------------|
    /// | request timeout           | `Timeout`     |
    /// | connect failure           | `Unavailable` |
    /// | HTTP 401 / 403 / 404      | `Unavailable` |
    /// | other status, body, parse | `Failure`     |
    pub fn from_reqwest(stage: Stage, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return CollaboratorError::Timeout { stage };
        }
        if e.is_connect() {
            return Self::unavailable(stage, e.to_string());
        }
        match e.status().map(|s| s.as_u16()) {
            Some(401 | 403 | 404) => Self::unavailable(stage, e.to_string()),
            _ => Self::failure(stage, e.to_string()),
        }
    }
}

/// Run `call`, failing with [`CollaboratorError::Timeout`] after `limit`.
pub async fn with_timeout<T, F>(stage: Stage, limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout { stage }),
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The three collaborators a pipeline needs, shared by every room.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Collaborators {
    /// HTTP-backed collaborators from application config.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            transcriber: Arc::new(HttpTranscriber::from_config(&config.stt)),
            translator: Arc::new(ApiTranslator::from_config(&config.translate)),
            synthesizer: Arc::new(HttpSynthesizer::from_config(&config.tts)),
        }
    }
}

/// Builds the `reqwest` client every HTTP collaborator uses.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Trim a trailing `/` so `format!("{base}/path")` never doubles it.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
