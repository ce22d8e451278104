//! Error types for the audit engine.
//!
//! This module provides structured error handling with:
//! - `AppError`: domain-specific errors carrying the audit error taxonomy
//! - `Result<T>`: type alias for Results using AppError
//!
//! Every user-visible error exposes a stable taxonomy code via [`AppError::code`]
//! so the polling surface can report `<code>: <message>` without matching on
//! variants.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// DOMAIN ERROR TYPE
// ============================================================================

/// Domain-specific errors for audit operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown job id
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Transition attempted out of a terminal job state
    #[error("Illegal state transition for job {job_id}: {from} -> {to}")]
    IllegalState {
        job_id: String,
        from: String,
        to: String,
    },

    /// Invalid or malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Root URL could not be fetched; the whole crawl is void
    #[error("Root URL unreachable: {0}")]
    CrawlFatal(String),

    /// Some pages failed to fetch; crawl result is usable but incomplete
    #[error("Crawl incomplete: {failed} of {attempted} pages failed")]
    CrawlPartial { failed: usize, attempted: usize },

    /// Retryable model endpoint failure (timeout, 5xx, 429)
    #[error("Model endpoint error (transient): {message}")]
    LlmTransient {
        message: String,
        /// Server-supplied delay from a 429 response, if any
        retry_after: Option<Duration>,
    },

    /// Non-retryable model endpoint failure (4xx other than 429)
    #[error("Model endpoint error (permanent): {0}")]
    LlmPermanent(String),

    /// Model output was not valid JSON even after tolerant repair
    #[error("Model output unparseable: {0}")]
    ParseFailed(String),

    /// Fewer than the minimum number of modules completed
    #[error("Insufficient module coverage: only {completed} of {required} modules completed")]
    InsufficientCoverage { completed: usize, required: usize },

    /// Per-job wall-clock ceiling exceeded
    #[error("Job exceeded its wall-clock ceiling")]
    Deadline,

    /// Cooperative cancellation observed
    #[error("Job cancelled")]
    Cancelled,

    /// Retryable persistence failure
    #[error("Persistence error (transient): {0}")]
    PersistenceTransient(String),

    /// Required configuration binding absent at startup
    #[error("Missing required configuration: {0}")]
    ConfigMissing(&'static str),

    /// Generic error with context
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Stable taxonomy code for user-visible error reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::IllegalState { .. } => "IllegalState",
            Self::InvalidUrl(_) => "InvalidUrl",
            Self::CrawlFatal(_) => "CrawlFatal",
            Self::CrawlPartial { .. } => "CrawlPartial",
            Self::LlmTransient { .. } => "LLMTransient",
            Self::LlmPermanent(_) => "LLMPermanent",
            Self::ParseFailed(_) => "ParseFailed",
            Self::InsufficientCoverage { .. } => "InsufficientCoverage",
            Self::Deadline => "Deadline",
            Self::Cancelled => "Cancelled",
            Self::PersistenceTransient(_) => "PersistenceTransient",
            Self::ConfigMissing(_) => "ConfigMissing",
            Self::Other(_) => "Internal",
        }
    }

    /// Short `<code>: <message>` form stored on failed job rows.
    pub fn user_message(&self) -> String {
        format!("{}: {}", self.code(), self)
    }

    /// True when a local retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmTransient { .. } | Self::PersistenceTransient(_)
        )
    }

    /// Create a transient model error without a server-supplied delay.
    pub fn llm_transient(msg: impl Into<String>) -> Self {
        Self::LlmTransient {
            message: msg.into(),
            retry_after: None,
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::NotFound("x".into()).code(), "NotFound");
        assert_eq!(AppError::Deadline.code(), "Deadline");
        assert_eq!(
            AppError::InsufficientCoverage {
                completed: 4,
                required: 6
            }
            .code(),
            "InsufficientCoverage"
        );
        assert_eq!(AppError::llm_transient("429").code(), "LLMTransient");
    }

    #[test]
    fn user_message_includes_code_and_text() {
        let err = AppError::CrawlFatal("dns failure".into());
        let msg = err.user_message();
        assert!(msg.starts_with("CrawlFatal:"));
        assert!(msg.contains("dns failure"));
    }

    #[test]
    fn transient_classification() {
        assert!(AppError::llm_transient("timeout").is_transient());
        assert!(AppError::PersistenceTransient("locked".into()).is_transient());
        assert!(!AppError::LlmPermanent("400".into()).is_transient());
        assert!(!AppError::Cancelled.is_transient());
    }
}
