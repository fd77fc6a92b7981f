//! Translation collaborator.
//!
//! [`ApiTranslator`] calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint (Groq by default; Ollama, OpenAI, vLLM all work).  All connection
//! details come from [`TranslateConfig`].

use async_trait::async_trait;

use super::prompt::InterpreterPrompt;
use super::{endpoint, http_client, CollaboratorError, Stage};
use crate::config::TranslateConfig;
use crate::room::Language;

// ---------------------------------------------------------------------------
// Translator trait
// ---------------------------------------------------------------------------

/// Translates recognised speech into a room's language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: Language) -> Result<String, CollaboratorError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Translator>) {}
};

// ---------------------------------------------------------------------------
// ApiTranslator
// ---------------------------------------------------------------------------

pub struct ApiTranslator {
    client: reqwest::Client,
    config: TranslateConfig,
}

impl ApiTranslator {
    /// The HTTP client carries `config.timeout_secs` as its request timeout.
    pub fn from_config(config: &TranslateConfig) -> Self {
        Self {
            client: http_client(config.timeout_secs),
            config: config.clone(),
        }
    }

    fn request_body(&self, text: &str, target: Language) -> serde_json::Value {
        let (system_msg, user_msg) = InterpreterPrompt::new(target).build_chat(text);
        serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  512
        })
    }
}

#[async_trait]
impl Translator for ApiTranslator {
    /// The `Authorization: Bearer …` header is attached only for a non-empty
    /// `api_key`, so local providers work without one.
    async fn translate(&self, text: &str, target: Language) -> Result<String, CollaboratorError> {
        let stage = Stage::Translate;
        let url = endpoint(&self.config.base_url, "/v1/chat/completions");

        let mut req = self.client.post(&url).json(&self.request_body(text, target));

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
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

        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String, CollaboratorError> {
    let translated = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| CollaboratorError::failure(Stage::Translate, "response has no content"))?
        .trim()
        .to_string();

    if translated.is_empty() {
        return Err(CollaboratorError::failure(
            Stage::Translate,
            "model returned an empty translation",
        ));
    }
    Ok(translated)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_config(api_key: Option<&str>) -> TranslateConfig {
        TranslateConfig {
            base_url: "http://localhost:11434".into(),
            api_key: api_key.map(|s| s.to_string()),
            model: "qwen2.5:3b".into(),
            temperature: 0.2,
            timeout_secs: 5,
        }
    }

    #[test]
    fn body_carries_model_and_interpreter_prompt() {
        let t = ApiTranslator::from_config(&make_config(None));
        let body = t.request_body("谢谢大家", Language::Vietnamese);
        assert_eq!(body["model"], "qwen2.5:3b");
        assert_eq!(body["messages"][1]["content"], "谢谢大家");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("Vietnamese"));
    }

    #[test]
    fn parses_first_choice() {
        let body = json!({ "choices": [ { "message": { "content": " 감사합니다 \n" } } ] });
        assert_eq!(parse_completion(&body).unwrap(), "감사합니다");
    }

    #[test]
    fn blank_or_missing_content_is_failure() {
        let blank = json!({ "choices": [ { "message": { "content": "   " } } ] });
        assert!(matches!(
            parse_completion(&blank),
            Err(CollaboratorError::Failure { .. })
        ));
        assert!(parse_completion(&json!({})).is_err());
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let _t = ApiTranslator::from_config(&make_config(Some("")));
    }

    #[test]
    fn translator_is_object_safe() {
        let t: Box<dyn Translator> = Box::new(ApiTranslator::from_config(&make_config(None)));
        drop(t);
    }
}
