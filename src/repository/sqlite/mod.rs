//! Sqlite repositories over the external schema.
//!
//! Writes are idempotent: module results upsert on (job_id, module_name),
//! reports on job_id, and terminal job transitions re-asserting the same
//! state are no-ops. Transient sqlite failures (busy/locked) are retried
//! locally before surfacing.

mod job_repository;
mod report_repository;
mod result_repository;

pub use job_repository::JobRepository;
pub use report_repository::ReportRepository;
pub use result_repository::ResultRepository;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::models::{JobStatus, ModuleStatus, PlanTier};
use crate::error::{AppError, Result};

const WRITE_ATTEMPTS: u32 = 3;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Retry a write a few times before giving up. Sqlite under concurrent
/// writers surfaces SQLITE_BUSY as a database error; a short backoff clears it.
pub(crate) async fn with_write_retries<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut last_err = None;
    for attempt in 1..=WRITE_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::warn!("persistence write failed (attempt {attempt}): {e}");
                last_err = Some(e);
                if attempt < WRITE_ATTEMPTS {
                    tokio::time::sleep(WRITE_RETRY_DELAY).await;
                }
            }
        }
    }
    Err(AppError::PersistenceTransient(
        last_err.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

pub(crate) fn map_job_status(s: &str) -> JobStatus {
    JobStatus::from_str(s).unwrap_or(JobStatus::Failed)
}

pub(crate) fn map_module_status(s: &str) -> ModuleStatus {
    ModuleStatus::from_str(s).unwrap_or(ModuleStatus::Failed)
}

pub(crate) fn map_plan(s: &str) -> PlanTier {
    PlanTier::from_str(s).unwrap_or(PlanTier::Basic)
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
