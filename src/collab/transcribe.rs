//! Speech-to-text collaborator.
//!
//! [`HttpTranscriber`] posts each frame to a Deepgram-compatible
//! `/v1/listen` endpoint and reads
//! `results.channels[0].alternatives[0].transcript`.  An empty transcript is
//! a valid answer (silence), not an error.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::{endpoint, http_client, CollaboratorError, Stage};
use crate::audio::AudioFrame;
use crate::config::SttConfig;

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Turns one frame of broadcaster audio into text.
///
/// Returns an empty string when no speech was recognised.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, frame: &AudioFrame) -> Result<String, CollaboratorError>;
}

// Compile-time check: `Transcriber` must stay object-safe.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// HttpTranscriber
// ---------------------------------------------------------------------------

pub struct HttpTranscriber {
    client: reqwest::Client,
    config: SttConfig,
}

impl HttpTranscriber {
    pub fn from_config(config: &SttConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
        }
    }

    fn url(&self) -> String {
        endpoint(&self.config.base_url, "/v1/listen")
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, frame: &AudioFrame) -> Result<String, CollaboratorError> {
        let stage = Stage::Transcribe;

        let mut req = self
            .client
            .post(self.url())
            .query(&[
                ("model", self.config.model.as_str()),
                ("language", self.config.language.as_str()),
                ("punctuate", "true"),
            ])
            .header(CONTENT_TYPE, self.config.content_type.as_str())
            .body(frame.data.clone());

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.header(AUTHORIZATION, format!("Token {key}"));
        }

        let response = req
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CollaboratorError::from_reqwest(stage, e))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CollaboratorError::failure(stage, e.to_string()))?;

        parse_transcript(&json)
    }
}

fn parse_transcript(json: &serde_json::Value) -> Result<String, CollaboratorError> {
    json["results"]["channels"][0]["alternatives"][0]["transcript"]
        .as_str()
        .map(|t| t.trim().to_string())
        .ok_or_else(|| CollaboratorError::failure(Stage::Transcribe, "response has no transcript"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_first_alternative() {
        let body = json!({
            "results": { "channels": [ { "alternatives": [
                { "transcript": " 大家好 ", "confidence": 0.98 },
                { "transcript": "大家", "confidence": 0.40 }
            ] } ] }
        });
        assert_eq!(parse_transcript(&body).unwrap(), "大家好");
    }

    #[test]
    fn empty_transcript_is_silence_not_error() {
        let body = json!({
            "results": { "channels": [ { "alternatives": [ { "transcript": "" } ] } ] }
        });
        assert_eq!(parse_transcript(&body).unwrap(), "");
    }

    #[test]
    fn missing_transcript_is_failure() {
        let err = parse_transcript(&json!({ "err_code": "BAD" })).unwrap_err();
        assert_eq!(err.stage(), Stage::Transcribe);
        assert!(matches!(err, CollaboratorError::Failure { .. }));
    }

    #[test]
    fn url_uses_listen_path() {
        let t = HttpTranscriber::from_config(&SttConfig {
            base_url: "http://stt.local/".into(),
            ..SttConfig::default()
        });
        assert_eq!(t.url(), "http://stt.local/v1/listen");
    }

    #[test]
    fn transcriber_is_object_safe() {
        let t: Box<dyn Transcriber> = Box::new(HttpTranscriber::from_config(&SttConfig::default()));
        drop(t);
    }
}
