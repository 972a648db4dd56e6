//! Gemini REST client.
//!
//! Talks to the Google Generative Language `generateContent` endpoint.
//! Errors are classified into the transient/fatal taxonomy so the retry
//! wrapper and the coordinator's stand-in latch can react correctly.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{classify_http_status, LlmClient, LlmError};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for Google's Gemini models.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for the given model.
    ///
    /// Fails fatally when the key is empty: there is no point retrying a
    /// request that is guaranteed to be rejected.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::fatal("GEMINI_API_KEY is empty"));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Override the API endpoint (used by tests against a local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::transient(format!("request timed out: {e}"))
                } else {
                    LlmError::transient(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_status(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::transient(format!("malformed response body: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::transient("model returned no text"));
        }

        debug!(model = %self.model, chars = text.len(), "model response received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_fatal() {
        match GeminiClient::new("", "gemini-2.5-flash") {
            Err(err) => assert!(err.is_fatal()),
            Ok(_) => panic!("empty key must be rejected"),
        }
    }

    #[test]
    fn test_response_text_extraction() {
        let raw = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "part one " }, { "text": "part two" }] }
            }]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        assert_eq!(text, "part one part two");
    }
}
