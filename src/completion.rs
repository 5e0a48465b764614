//! OpenAI-compatible chat completion provider.
//!
//! Sends the assembled prompt as a single user message to
//! `POST {base_url}/chat/completions` with the configured model and
//! temperature (0.0 by default, for deterministic sampling). Retries follow
//! the same transient-error policy and backoff as the embedding provider;
//! `max_retries` defaults to 0.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use docchat_core::completion::CompletionProvider;
use docchat_core::error::GenerationError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{CompletionConfig, Credentials};
use crate::embedding::backoff_delay;

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    endpoint: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(config: &CompletionConfig, credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: credentials.api_key().to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }

    async fn send(&self, body: &serde_json::Value) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        extract_content(parsed)
    }
}

fn extract_content(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| GenerationError::Malformed("response has no message content".into()))
}

#[async_trait]
impl CompletionProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = self.request_body(prompt);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(attempt, ?delay, "retrying completion request");
                tokio::time::sleep(delay).await;
            }
            match self.send(&body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "completion request failed");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| GenerationError::Request("completion failed after retries".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> OpenAiChat {
        OpenAiChat::new(&CompletionConfig::default(), &Credentials::new("sk-test")).unwrap()
    }

    #[test]
    fn body_carries_model_temperature_and_prompt() {
        let body = chat().request_body("PROMPT");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "PROMPT");
    }

    #[test]
    fn first_choice_content_is_returned() {
        let json = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"1. **Summary:** blue"}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_content(resp).unwrap(), "1. **Summary:** blue");
    }

    #[test]
    fn missing_content_is_malformed() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            extract_content(resp),
            Err(GenerationError::Malformed(_))
        ));
        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_content(empty).is_err());
    }

    #[test]
    fn endpoint_respects_base_url() {
        let cfg = CompletionConfig {
            base_url: "http://localhost:1234/v1/".into(),
            ..CompletionConfig::default()
        };
        let chat = OpenAiChat::new(&cfg, &Credentials::new("k")).unwrap();
        assert_eq!(chat.endpoint, "http://localhost:1234/v1/chat/completions");
    }
}
