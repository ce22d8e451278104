//! Google Gemini provider for the model client trait.
//!
//! Uses the `generateContent` endpoint with a system instruction plus a single
//! user message. The base URL is overridable so tests can point the client at
//! a local mock server.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::error::{AppError, Result};

use super::{ChatRequest, ChatResponse, LlmClient, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    http: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(model: String, api_key: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(model, api_key, timeout, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        model: String,
        api_key: String,
        timeout: Duration,
        base_url: String,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Other(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            model,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: i64,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: i64,
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = json!({
            "system_instruction": {
                "parts": [{ "text": request.system }]
            },
            "contents": [{
                "parts": [{ "text": request.user }]
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens
            }
        });

        let started = Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::llm_transient(format!("request timed out: {e}"))
                } else {
                    AppError::llm_transient(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();

            return Err(classify_status(status, retry_after, &text));
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::llm_transient(format!("malformed provider response: {e}")))?;

        let text = parsed
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

        if text.is_empty() {
            return Err(AppError::llm_transient("provider returned no text"));
        }

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        log::debug!(
            "Model call finished in {}ms ({} tokens)",
            elapsed_ms,
            usage.total()
        );

        Ok(ChatResponse {
            text,
            usage,
            elapsed_ms,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> AppError {
    let message = format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AppError::LlmTransient {
            message,
            retry_after,
        }
    } else {
        AppError::LlmPermanent(message)
    }
}
