//! Per-job orchestration: crawl -> extract -> automated checks -> module
//! fan-out -> reduce -> persist.

mod canceler;
mod crawler;
mod dispatcher;
mod reducer;
mod reporter;

pub use canceler::JobCanceler;
pub use crawler::{canonical_url, Crawler};
pub use dispatcher::{ModuleDispatcher, ModuleOutcome};
pub use reducer::{Reducer, MIN_COMPLETED_MODULES};
pub use reporter::{phase, ProgressPublisher};

use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

use crate::checker::AutomatedChecker;
use crate::config::Config;
use crate::domain::models::Job;
use crate::error::{AppError, Result};
use crate::extractor::SnapshotExtractor;
use crate::llm::LlmClient;
use crate::prompt::PromptLibrary;
use crate::repository::{JobRepository, ReportRepository, ResultRepository};

/// Shared handles threaded through the orchestrator. Initialized once at
/// startup; no component reaches for process-wide state.
pub struct Services {
    pub pool: SqlitePool,
    pub config: Config,
    pub llm: Arc<dyn LlmClient>,
    /// Global bound on concurrent model calls across all jobs.
    pub llm_limiter: Arc<Semaphore>,
    pub prompts: PromptLibrary,
    pub crawler: Crawler,
    pub canceler: JobCanceler,
}

impl Services {
    pub fn new(pool: SqlitePool, config: Config, llm: Arc<dyn LlmClient>) -> Result<Self> {
        let prompts = match &config.prompts_dir {
            Some(dir) => PromptLibrary::with_overrides(dir),
            None => PromptLibrary::embedded(),
        };
        let crawler = Crawler::new(config.fetch_timeout, config.crawl_budget)?;
        let llm_limiter = Arc::new(Semaphore::new(config.llm_max_concurrency.max(1)));

        Ok(Self {
            pool,
            config,
            llm,
            llm_limiter,
            prompts,
            crawler,
            canceler: JobCanceler::new(),
        })
    }
}

/// Runs one job from acceptance to its terminal state.
pub struct JobProcessor;

impl JobProcessor {
    /// Top-level entry: enforces the wall-clock ceiling and guarantees the
    /// terminal-state write is the job's last write.
    pub async fn process(services: Arc<Services>, job: Job) {
        let job_id = job.id.clone();
        let cancel_flag = services.canceler.get_cancel_flag(&job_id);
        let publisher = ProgressPublisher::spawn(services.pool.clone(), job_id.clone());

        let outcome = tokio::time::timeout(
            services.config.job_deadline,
            Self::run_pipeline(&services, &job, &cancel_flag, &publisher),
        )
        .await;

        // Flush the last progress value before the terminal write.
        publisher.finish().await;

        let jobs = JobRepository::new(services.pool.clone());
        let write = match outcome {
            Ok(Ok(())) => jobs.complete(&job_id).await,
            Ok(Err(AppError::Cancelled)) => jobs.cancel(&job_id).await,
            Ok(Err(e)) => {
                log::error!("Job {} failed: {}", job_id, e);
                jobs.fail(&job_id, &e.user_message()).await
            }
            Err(_) => {
                log::error!("Job {} exceeded its wall-clock ceiling", job_id);
                jobs.fail(&job_id, &AppError::Deadline.user_message()).await
            }
        };
        if let Err(e) = write {
            log::error!("Terminal write for job {} failed: {}", job_id, e);
        }

        services.canceler.remove(&job_id);
    }

    async fn run_pipeline(
        services: &Services,
        job: &Job,
        cancel_flag: &AtomicBool,
        publisher: &ProgressPublisher,
    ) -> Result<()> {
        let jobs = JobRepository::new(services.pool.clone());

        jobs.begin(&job.id).await?;
        publisher.publish(phase::ACCEPTED, Some("job accepted"));

        let root = Url::parse(&job.url).map_err(|_| AppError::InvalidUrl(job.url.clone()))?;

        // Crawl.
        publisher.publish(phase::CRAWLING, Some("crawling site"));
        let crawl = services
            .crawler
            .crawl(&root, job.max_pages as usize, cancel_flag)
            .await?;
        ensure_live(cancel_flag)?;
        publisher.publish(phase::CRAWLED, Some("crawl finished"));

        // Extract + automated checks.
        let site = SnapshotExtractor::extract(&crawl);
        if site.pages.is_empty() {
            return Err(AppError::CrawlFatal(format!(
                "no page could be parsed below {}",
                crawl.root_url
            )));
        }
        let checks = AutomatedChecker::run(&site);
        ensure_live(cancel_flag)?;
        publisher.publish(phase::CHECKS_DONE, Some("automated checks finished"));

        // Twelve-way module fan-out.
        ModuleDispatcher::run_all(services, &job.id, &site, &checks, cancel_flag, publisher)
            .await;
        ensure_live(cancel_flag)?;
        publisher.publish(phase::REDUCING, Some("aggregating module results"));

        // Reduce over the persisted rows (the source of truth).
        let results = ResultRepository::new(services.pool.clone());
        let records = results.list(&job.id).await?;
        let report = Reducer::reduce(job, &site, &checks, &records)?;

        publisher.publish(phase::PERSISTING, Some("persisting report"));
        ReportRepository::new(services.pool.clone())
            .upsert(&report)
            .await?;

        Ok(())
    }
}

fn ensure_live(cancel_flag: &AtomicBool) -> Result<()> {
    if cancel_flag.load(Ordering::Relaxed) {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}
