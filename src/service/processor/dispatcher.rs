//! Concurrent module dispatch.
//!
//! Fans the twelve axis modules out against the model endpoint. Each module
//! is an independent unit of work: prompt assembly, model call under the
//! shared global semaphore, strict parse, tolerant repair, validation, and
//! persistence. A permanent failure in one module never disturbs the others.
//!
//! Retry policy: up to 3 call attempts per module, exponential backoff
//! (base 1s, factor 2, jitter +-20%); a 429 with a server-supplied delay
//! sleeps that delay instead. Parse/validation failures consume an attempt,
//! so a response that repairs cleanly costs no retry.

use futures::stream::{self, StreamExt};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::checker::AutomatedChecks;
use crate::domain::analysis::{parse_model_output, AnalysisResult};
use crate::domain::axes::AxisKey;
use crate::domain::models::ModuleStatus;
use crate::error::AppError;
use crate::extractor::SiteSnapshot;
use crate::llm::{repair, ChatRequest, LlmClient};
use crate::prompt::{module_payload, PromptLibrary, SYSTEM_PREAMBLE};
use crate::repository::ResultRepository;

use super::reporter::{phase, ProgressPublisher};
use super::Services;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Outcome of one module run, mirrored into its persisted row.
#[derive(Debug)]
pub struct ModuleOutcome {
    pub axis: AxisKey,
    pub status: ModuleStatus,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub token_usage: i64,
}

pub struct ModuleDispatcher;

impl ModuleDispatcher {
    /// Run all registered modules with bounded concurrency. Results are
    /// persisted in completion order; progress advances as modules finish.
    pub async fn run_all(
        services: &Services,
        job_id: &str,
        site: &SiteSnapshot,
        checks: &AutomatedChecks,
        cancel_flag: &AtomicBool,
        publisher: &ProgressPublisher,
    ) -> Vec<ModuleOutcome> {
        let results = ResultRepository::new(services.pool.clone());
        let completed = AtomicUsize::new(0);
        let total = AxisKey::ALL.len();

        stream::iter(AxisKey::ALL)
            .map(|axis| {
                let results = &results;
                let completed = &completed;
                async move {
                    let outcome =
                        run_module(services, results, job_id, axis, site, checks, cancel_flag)
                            .await;

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    let message = format!("module {} finished", axis);
                    publisher.publish(phase::modules(done, total), Some(message.as_str()));
                    outcome
                }
            })
            .buffer_unordered(services.config.module_concurrency.max(2))
            .collect()
            .await
    }
}

/// One module: assemble, call, parse, validate, persist.
async fn run_module(
    services: &Services,
    results: &ResultRepository,
    job_id: &str,
    axis: AxisKey,
    site: &SiteSnapshot,
    checks: &AutomatedChecks,
    cancel_flag: &AtomicBool,
) -> ModuleOutcome {
    if cancel_flag.load(Ordering::Relaxed) {
        // Not yet observed: leave no row, the module reads as pending.
        return ModuleOutcome {
            axis,
            status: ModuleStatus::Pending,
            result: None,
            error: Some(AppError::Cancelled.user_message()),
            token_usage: 0,
        };
    }

    if let Err(e) = results.upsert_running(job_id, axis).await {
        log::error!("Failed to open module row {}/{}: {}", job_id, axis, e);
    }

    let payload = module_payload(axis, site, checks);
    let prompt = services.prompts.assemble(axis, &payload);
    let mut tokens: i64 = 0;
    let mut raw_output: Option<String> = None;

    let failure = 'attempts: {
        for attempt in 1..=MAX_ATTEMPTS {
            if cancel_flag.load(Ordering::Relaxed) {
                break 'attempts AppError::Cancelled;
            }

            let response = {
                let _permit = services
                    .llm_limiter
                    .acquire()
                    .await
                    .expect("llm semaphore never closes");
                services
                    .llm
                    .complete(ChatRequest {
                        system: SYSTEM_PREAMBLE.to_string(),
                        user: prompt.clone(),
                        temperature: services.config.temperature,
                        max_output_tokens: services.config.max_output_tokens,
                    })
                    .await
            };

            let error = match response {
                Ok(response) => {
                    tokens += response.usage.total();
                    raw_output = Some(response.text.clone());

                    match parse_and_validate(&response.text) {
                        Ok(result) => {
                            if let Err(e) = results
                                .upsert_completed(job_id, axis, &result, &response.text, tokens)
                                .await
                            {
                                log::error!("Failed to persist module {}: {}", axis, e);
                            }
                            return ModuleOutcome {
                                axis,
                                status: ModuleStatus::Completed,
                                result: Some(result),
                                error: None,
                                token_usage: tokens,
                            };
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            let retry_delay = match &error {
                AppError::LlmTransient { retry_after, .. } if attempt < MAX_ATTEMPTS => {
                    Some(retry_after.unwrap_or_else(|| backoff_delay(attempt)))
                }
                AppError::ParseFailed(_) if attempt < MAX_ATTEMPTS => Some(backoff_delay(attempt)),
                _ => None,
            };

            match retry_delay {
                Some(delay) => {
                    log::warn!(
                        "Module {} attempt {}/{} failed, retrying in {:?}: {}",
                        axis,
                        attempt,
                        MAX_ATTEMPTS,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
                None => break 'attempts error,
            }
        }
        unreachable!("loop exits via return or labeled break");
    };

    let message = failure.user_message();
    if let Err(e) = results
        .upsert_failed(job_id, axis, raw_output.as_deref(), &message, tokens)
        .await
    {
        log::error!("Failed to persist module failure {}: {}", axis, e);
    }

    ModuleOutcome {
        axis,
        status: ModuleStatus::Failed,
        result: None,
        error: Some(message),
        token_usage: tokens,
    }
}

fn parse_and_validate(raw: &str) -> crate::error::Result<AnalysisResult> {
    let value = repair::parse_with_repair(raw)?;
    parse_model_output(value)
}

/// Exponential backoff with +-20% jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE.as_millis() as u64 * 2u64.pow(attempt - 1);
    let jitter = rand::thread_rng().gen_range(0.8..=1.2);
    Duration::from_millis((base as f64 * jitter) as u64)
}
