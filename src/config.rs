//! Environment-driven configuration.
//!
//! All knobs come from the process environment. Required bindings are the
//! model API key and the persistence URL; everything else has a default.
//! Binding failures surface as `ConfigMissing` and the binary exits
//! non-zero before any service starts.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Default crawl size when neither the request nor the environment says.
pub const DEFAULT_MAX_PAGES: i64 = 5;

/// Runtime configuration for the engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model identifier, e.g. "gemini-2.0-flash".
    pub model: String,
    /// API key for the model endpoint.
    pub model_api_key: String,
    /// Override for the model endpoint base URL (tests point this at a mock).
    pub model_base_url: Option<String>,
    /// Persistence URL (sqlite path or ":memory:" style URL).
    pub database_url: String,
    /// Global bound on concurrent model calls across all jobs.
    pub llm_max_concurrency: usize,
    /// Bound on concurrent module dispatches within one job.
    pub module_concurrency: usize,
    /// Per-model-call timeout.
    pub llm_timeout: Duration,
    /// Per-job wall-clock ceiling.
    pub job_deadline: Duration,
    /// Per-page fetch timeout for the crawler.
    pub fetch_timeout: Duration,
    /// Total crawl budget per job.
    pub crawl_budget: Duration,
    /// Default page cap when the submission does not carry one.
    pub default_max_pages: i64,
    /// Sampling temperature for module calls.
    pub temperature: f64,
    /// Max output tokens per module call.
    pub max_output_tokens: u32,
    /// Optional directory of axis prompt templates overriding the embedded ones.
    pub prompts_dir: Option<PathBuf>,
}

impl Config {
    /// Bind configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let model_api_key = required("MODEL_API_KEY")?;
        let database_url = required("DATABASE_URL")?;

        Ok(Self {
            model: env_or("MODEL_ID", "gemini-2.0-flash"),
            model_api_key,
            model_base_url: env::var("MODEL_BASE_URL").ok(),
            database_url,
            llm_max_concurrency: env_parse("LLM_MAX_CONCURRENCY", 32),
            module_concurrency: env_parse("MODULE_CONCURRENCY", 12).max(2),
            llm_timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 120)),
            job_deadline: Duration::from_secs(env_parse("JOB_DEADLINE_SECS", 30 * 60)),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", 30)),
            crawl_budget: Duration::from_secs(env_parse("CRAWL_BUDGET_SECS", 120)),
            default_max_pages: env_parse("DEFAULT_MAX_PAGES", DEFAULT_MAX_PAGES),
            temperature: env_parse("MODEL_TEMPERATURE", 0.1),
            max_output_tokens: env_parse("MODEL_MAX_OUTPUT_TOKENS", 8192),
            prompts_dir: env::var("PROMPTS_DIR").ok().map(PathBuf::from),
        })
    }

    /// A configuration suitable for tests: everything local, small timeouts.
    pub fn for_tests(model_base_url: String, database_url: String) -> Self {
        Self {
            model: "test-model".into(),
            model_api_key: "test-key".into(),
            model_base_url: Some(model_base_url),
            database_url,
            llm_max_concurrency: 8,
            module_concurrency: 4,
            llm_timeout: Duration::from_secs(10),
            job_deadline: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(5),
            crawl_budget: Duration::from_secs(20),
            default_max_pages: DEFAULT_MAX_PAGES,
            temperature: 0.0,
            max_output_tokens: 4096,
            prompts_dir: None,
        }
    }
}

fn required(key: &'static str) -> Result<String> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::ConfigMissing(key)),
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_binding_is_config_missing() {
        // MODEL_API_KEY is absent in the test environment unless set.
        std::env::remove_var("MODEL_API_KEY");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.code(), "ConfigMissing");
    }

    #[test]
    fn test_config_has_floor_on_module_concurrency() {
        let cfg = Config::for_tests("http://localhost".into(), "sqlite::memory:".into());
        assert!(cfg.module_concurrency >= 2);
    }
}
