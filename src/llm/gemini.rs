//! Gemini Backend - HTTPS client for the hosted `generateContent` API
//!
//! One prompt in, the first candidate's text out. Status codes are mapped
//! onto `ServiceError` so the retry policy can tell transient failures from
//! permanent ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmBackend, ServiceError};
use crate::config::LlmConfig;

/// HTTP backend for Gemini models
#[derive(Clone)]
pub struct GeminiBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiBackend {
    /// Create a backend with an explicit API key
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Create a backend reading the API key from `config.api_key_env`
    pub fn from_env(config: &LlmConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ServiceError::Auth(format!("{} is not set", config.api_key_env)))?;
        Self::new(config, &api_key)
    }

    /// Model name for logging
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn map_transport(&self, e: &reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout_secs)
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

/// Join the text parts of the first candidate.
fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(&e))?;

        let status = resp.status();
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                return Err(ServiceError::Auth(format!("status {}", status.as_u16())));
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => return Err(ServiceError::RateLimited),
            s if !s.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(ServiceError::Status {
                    status: s.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }
            _ => {}
        }

        let bytes = resp.bytes().await.map_err(|e| self.map_transport(&e))?;
        let parsed: GenerateResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::InvalidBody(e.to_string()))?;

        let text = first_candidate_text(parsed).ok_or(ServiceError::EmptyResponse)?;
        tracing::debug!(model = %self.model, chars = text.len(), "Gemini completion received");
        Ok(text)
    }

    fn backend_name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: "hello" }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 64,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn test_first_candidate_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(first_candidate_text(response).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_blocked_candidate_is_empty() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(first_candidate_text(response).is_none());

        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(first_candidate_text(response).is_none());
    }

    #[test]
    fn test_endpoint_uses_model() {
        let mut config = LlmConfig::default();
        config.base_url = "http://localhost:9999/v1beta/".to_string();
        config.model = "gemini-test".to_string();
        let backend = GeminiBackend::new(&config, "key").unwrap();
        assert_eq!(
            backend.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let mut config = LlmConfig::default();
        config.api_key_env = "LINECAST_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        match GeminiBackend::from_env(&config) {
            Err(ServiceError::Auth(msg)) => assert!(msg.contains("LINECAST_TEST_KEY")),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("expected missing key to fail"),
        }
    }
}
