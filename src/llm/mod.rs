//! Model client abstraction.
//!
//! The engine talks to a chat-completion-style endpoint through [`LlmClient`];
//! the concrete provider is pluggable. One client instance is shared across
//! all jobs; the global concurrency bound lives in the engine, not here.

pub mod gemini;
pub mod repair;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One chat-style completion request: a system preamble plus a user message.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

impl TokenUsage {
    pub fn total(&self) -> i64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Completion text plus accounting metadata.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub elapsed_ms: u64,
}

/// Chat-completion endpoint. Implementations map provider failures onto the
/// `LlmTransient`/`LlmPermanent` taxonomy so the dispatcher can decide about
/// retries without knowing the provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Model identifier, for logging and report metadata.
    fn model(&self) -> &str;
}
