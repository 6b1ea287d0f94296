//! OpenAI-compatible chat-completions client for strategy narratives

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::clients::traits::{GeneratorError, NarrativeGenerator, NarrativePrompt};
use crate::config::GeneratorConfig;

#[derive(Clone, Debug)]
pub struct ChatCompletionsClient {
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    timeout_ms: u64,
    client: Client,
}

impl ChatCompletionsClient {
    /// Fails only when the underlying HTTP client cannot be built (TLS backend).
    pub fn new(cfg: &GeneratorConfig, api_key: impl Into<String>) -> Result<Self, GeneratorError> {
        // Accept either the API root or the full completions URL
        let endpoint = if cfg.base_url.ends_with("/chat/completions") {
            cfg.base_url.clone()
        } else {
            format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'))
        };

        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| GeneratorError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            model: cfg.model.clone(),
            api_key: api_key.into(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            timeout_ms: cfg.timeout_ms,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn request_body(&self, prompt: &NarrativePrompt) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &NarrativePrompt) -> Result<String, GeneratorError> {
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status,
                body: truncate_snippet(body.trim(), 500),
            });
        }

        let response_json: Value = res.json().await.map_err(|e| self.map_transport(e))?;
        extract_content(&response_json)
    }

    fn name(&self) -> &str {
        "chat_completions"
    }
}

impl ChatCompletionsClient {
    fn map_transport(&self, err: reqwest::Error) -> GeneratorError {
        match GeneratorError::from(err) {
            GeneratorError::Timeout { .. } => GeneratorError::Timeout {
                timeout_ms: self.timeout_ms,
            },
            other => other,
        }
    }
}

/// `choices[0].message.content`, trimmed.
fn extract_content(response: &Value) -> Result<String, GeneratorError> {
    let content = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| {
            GeneratorError::ResponseShape("missing choices[0].message.content".to_string())
        })?;
    let text = content.as_str().unwrap_or("").trim();
    if text.is_empty() {
        return Err(GeneratorError::EmptyResponse);
    }
    Ok(text.to_string())
}

fn truncate_snippet(input: &str, max: usize) -> String {
    if input.len() <= max {
        return input.to_string();
    }
    let mut end = max;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &input[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_completed_from_api_root() {
        let cfg = GeneratorConfig {
            base_url: "https://api.example.com/v1/".into(),
            ..GeneratorConfig::default()
        };
        let client = ChatCompletionsClient::new(&cfg, "k").unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");

        let cfg = GeneratorConfig {
            base_url: "http://127.0.0.1:8111/v1/chat/completions".into(),
            ..GeneratorConfig::default()
        };
        let client = ChatCompletionsClient::new(&cfg, "k").unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8111/v1/chat/completions");
    }

    #[test]
    fn configured_timeout_is_kept() {
        let cfg = GeneratorConfig {
            timeout_ms: 1_500,
            ..GeneratorConfig::default()
        };
        let client = ChatCompletionsClient::new(&cfg, "k").unwrap();
        assert_eq!(client.timeout_ms(), 1_500);
    }

    #[test]
    fn request_body_carries_both_messages() {
        let client = ChatCompletionsClient::new(&GeneratorConfig::default(), "k").unwrap();
        let body = client.request_body(&NarrativePrompt {
            system: "sys".into(),
            user: "usr".into(),
        });
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn extracts_message_content() {
        let v = serde_json::json!({"choices": [{"message": {"content": "  {\"a\":1} "}}]});
        assert_eq!(extract_content(&v).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn empty_or_missing_content_is_an_error() {
        let v = serde_json::json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(extract_content(&v), Err(GeneratorError::EmptyResponse)));
        let v = serde_json::json!({"error": "nope"});
        assert!(matches!(
            extract_content(&v),
            Err(GeneratorError::ResponseShape(_))
        ));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_snippet("héllo", 2), "h...");
        assert_eq!(truncate_snippet("ok", 10), "ok");
    }
}
