//! Public surface of the analysis core.
//!
//! The external HTTP façade calls [`AuditEngine::submit`] / [`poll`] /
//! [`cancel`] / [`get_report`]; alternatively, rows inserted directly into
//! the store in `pending` are adopted by the [`AuditEngine::run`] polling
//! loop. Live jobs are tracked in an in-process table so a submission spawns
//! exactly one orchestration task.

use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use url::Url;

use crate::config::Config;
use crate::domain::models::{FinalReport, Job, JobInfo, JobPollResponse, JobStatus, SubmitRequest};
use crate::error::{AppError, Result};
use crate::llm::{GeminiClient, LlmClient};
use crate::repository::{JobRepository, ReportRepository};

use super::processor::{JobProcessor, Services};

/// Polling interval when no pending jobs are found
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Delay after a job fetch failure before retrying
const JOB_FETCH_RETRY_DELAY: Duration = Duration::from_secs(10);

pub struct AuditEngine {
    services: Arc<Services>,
    live_jobs: Arc<DashMap<String, JoinHandle<()>>>,
}

impl AuditEngine {
    /// Build the engine with the default model provider.
    pub fn new(pool: SqlitePool, config: Config) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = match &config.model_base_url {
            Some(base) => Arc::new(GeminiClient::with_base_url(
                config.model.clone(),
                config.model_api_key.clone(),
                config.llm_timeout,
                base.clone(),
            )?),
            None => Arc::new(GeminiClient::new(
                config.model.clone(),
                config.model_api_key.clone(),
                config.llm_timeout,
            )?),
        };
        Self::with_client(pool, config, llm)
    }

    /// Build the engine around an explicit model client.
    pub fn with_client(
        pool: SqlitePool,
        config: Config,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self> {
        Ok(Self {
            services: Arc::new(Services::new(pool, config, llm)?),
            live_jobs: Arc::new(DashMap::new()),
        })
    }

    fn jobs(&self) -> JobRepository {
        JobRepository::new(self.services.pool.clone())
    }

    /// Accept a submission: create the job row and start working on it.
    /// Returns the job id synchronously.
    pub async fn submit(&self, request: SubmitRequest) -> Result<String> {
        let url = Url::parse(&request.url)
            .map_err(|_| AppError::InvalidUrl(request.url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::InvalidUrl(request.url));
        }

        let max_pages = request
            .plan
            .effective_max_pages(request.max_pages, self.services.config.default_max_pages);

        let job_id = self
            .jobs()
            .create(
                url.as_str(),
                request.plan,
                max_pages,
                request.submitter_id.as_deref(),
            )
            .await?;

        let job = self.jobs().load(&job_id).await?;
        self.spawn_job(job);

        Ok(job_id)
    }

    /// Status snapshot for pollers.
    pub async fn poll(&self, job_id: &str) -> Result<JobPollResponse> {
        let job = self.jobs().load(job_id).await?;
        let report_available = ReportRepository::new(self.services.pool.clone())
            .exists(job_id)
            .await?;

        Ok(JobPollResponse {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            current_phase: job.current_phase,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
            error: job.error,
            report_available,
        })
    }

    /// Fetch the final artifact.
    pub async fn get_report(&self, job_id: &str) -> Result<FinalReport> {
        // Surface NotFound for unknown ids before looking for the report.
        let _ = self.jobs().load(job_id).await?;
        ReportRepository::new(self.services.pool.clone())
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("report for job {}", job_id)))
    }

    /// Recent jobs for operator tooling.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<JobInfo>> {
        self.jobs().list_recent(limit).await
    }

    /// Cooperative cancellation: flag the live task; a job still pending in
    /// the store (not yet adopted) is cancelled directly.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self.jobs().load(job_id).await?;
        match job.status {
            JobStatus::Pending => {
                self.services.canceler.set_cancelled(job_id);
                self.jobs().cancel(job_id).await
            }
            JobStatus::Running => {
                log::info!("Cancelling job {}", job_id);
                self.services.canceler.set_cancelled(job_id);
                Ok(())
            }
            terminal => Err(AppError::IllegalState {
                job_id: job_id.to_string(),
                from: terminal.to_string(),
                to: JobStatus::Cancelled.to_string(),
            }),
        }
    }

    /// Main polling loop: adopt pending rows inserted by external writers.
    pub async fn run(&self) -> Result<()> {
        log::info!("AuditEngine: starting job polling loop");

        loop {
            match self.jobs().get_pending(10).await {
                Ok(jobs) if !jobs.is_empty() => {
                    for job in jobs {
                        if self.live_jobs.contains_key(&job.id)
                            || self.services.canceler.is_cancelled(&job.id)
                        {
                            continue;
                        }
                        log::info!("Adopting job: {} ({})", job.id, job.url);
                        self.spawn_job(job);
                    }
                    // Give adopted jobs a moment to leave `pending`.
                    sleep(Duration::from_millis(250)).await;
                }
                Ok(_) => {
                    log::trace!("No pending jobs, sleeping...");
                    sleep(JOB_POLL_INTERVAL).await;
                }
                Err(e) => {
                    log::error!("Failed to fetch pending jobs: {}", e);
                    sleep(JOB_FETCH_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Number of jobs currently orchestrated by this process.
    pub fn live_job_count(&self) -> usize {
        self.live_jobs.retain(|_, handle| !handle.is_finished());
        self.live_jobs.len()
    }

    fn spawn_job(&self, job: Job) {
        let job_id = job.id.clone();
        let services = self.services.clone();
        let live_jobs = self.live_jobs.clone();

        let cleanup_id = job_id.clone();
        let handle = tokio::spawn(async move {
            JobProcessor::process(services, job).await;
            live_jobs.remove(&cleanup_id);
        });

        self.live_jobs.insert(job_id, handle);
    }

    /// Await completion of a specific live job (used by tests and shutdown).
    pub async fn wait_for(&self, job_id: &str) {
        if let Some((_, handle)) = self.live_jobs.remove(job_id) {
            let _ = handle.await;
        }
    }
}
