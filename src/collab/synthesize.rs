//! Text-to-speech collaborator.
//!
//! [`HttpSynthesizer`] posts to a Cartesia-compatible `/tts/bytes` endpoint
//! and returns the raw audio body (16-bit PCM in a WAV container).

use async_trait::async_trait;
use bytes::Bytes;

use super::{endpoint, http_client, CollaboratorError, Stage};
use crate::config::TtsConfig;
use crate::room::Language;

/// Renders translated text as speech for a room's output track.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, target: Language) -> Result<Bytes, CollaboratorError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Synthesizer>) {}
};

pub struct HttpSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl HttpSynthesizer {
    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
        }
    }

    fn request_body(&self, text: &str, target: Language) -> serde_json::Value {
        serde_json::json!({
            "model_id":   self.config.model,
            "transcript": text,
            "voice":      { "mode": "id", "id": self.config.voice_id },
            "language":   target.code(),
            "output_format": {
                "container":   "wav",
                "encoding":    "pcm_s16le",
                "sample_rate": self.config.sample_rate
            }
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, target: Language) -> Result<Bytes, CollaboratorError> {
        let stage = Stage::Synthesize;
        let url = endpoint(&self.config.base_url, "/tts/bytes");

        let mut req = self
            .client
            .post(&url)
            .header("Cartesia-Version", self.config.api_version.as_str())
            .json(&self.request_body(text, target));

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.header("X-API-Key", key);
        }

        let audio = req
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CollaboratorError::from_reqwest(stage, e))?
            .bytes()
            .await
            .map_err(|e| CollaboratorError::failure(stage, e.to_string()))?;

        if audio.is_empty() {
            return Err(CollaboratorError::failure(stage, "empty audio body"));
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_selects_voice_language_and_format() {
        let s = HttpSynthesizer::from_config(&TtsConfig::default());
        let body = s.request_body("xin chào", Language::Vietnamese);
        assert_eq!(body["model_id"], "sonic-multilingual");
        assert_eq!(body["language"], "vi");
        assert_eq!(body["voice"]["id"], "a0e99841-438c-4a64-b679-ae501e7d6091");
        assert_eq!(body["output_format"]["sample_rate"], 24_000);
    }
}
