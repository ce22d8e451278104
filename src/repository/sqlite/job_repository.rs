//! Job rows and the job state machine.
//!
//! All status transitions funnel through [`JobRepository::transition`], which
//! enforces the FSM: `pending -> running -> completed | failed | cancelled`,
//! terminal states absorbing. Progress writes clamp into 0..=99 (100 is
//! reserved for completion) and are monotonic at the SQL level.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::domain::models::{Job, JobInfo, JobStatus, PlanTier};
use crate::error::{AppError, Result};

use super::{map_job_status, map_plan, parse_datetime, with_write_retries};

pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new job in `pending`. Returns the job id.
    pub async fn create(
        &self,
        url: &str,
        plan: PlanTier,
        max_pages: i64,
        submitter_id: Option<&str>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        with_write_retries(|| {
            sqlx::query(
                r#"
                INSERT INTO analysis_jobs (id, url, plan, status, progress, max_pages,
                                           created_at, updated_at, user_id)
                VALUES (?, ?, ?, 'pending', 0, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(url)
            .bind(plan.as_str())
            .bind(max_pages)
            .bind(&now)
            .bind(&now)
            .bind(submitter_id)
            .execute(&self.pool)
        })
        .await?;

        log::info!("Created job {} for URL: {}", id, url);
        Ok(id)
    }

    /// Load a job by id.
    pub async fn load(&self, job_id: &str) -> Result<Job> {
        let row = sqlx::query(
            r#"
            SELECT id, url, plan, status, progress, current_phase, max_pages,
                   created_at, updated_at, completed_at, user_id, error
            FROM analysis_jobs
            WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::PersistenceTransient(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(job_id.to_string()))?;

        Ok(row_to_job(&row))
    }

    /// Oldest pending jobs, for the polling worker.
    pub async fn get_pending(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, plan, status, progress, current_phase, max_pages,
                   created_at, updated_at, completed_at, user_id, error
            FROM analysis_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::PersistenceTransient(e.to_string()))?;

        Ok(rows.iter().map(row_to_job).collect())
    }

    /// Recent jobs for operator listings.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<JobInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, plan, status, progress, created_at
            FROM analysis_jobs
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::PersistenceTransient(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| JobInfo {
                id: row.get("id"),
                url: row.get("url"),
                plan: map_plan(row.get("plan")),
                status: map_job_status(row.get("status")),
                progress: row.get("progress"),
                created_at: parse_datetime(row.get("created_at")),
            })
            .collect())
    }

    /// `pending -> running`. A job already running is left untouched.
    pub async fn begin(&self, job_id: &str) -> Result<()> {
        self.transition(job_id, JobStatus::Running, None).await
    }

    /// `running -> completed`, setting progress to 100.
    pub async fn complete(&self, job_id: &str) -> Result<()> {
        self.transition(job_id, JobStatus::Completed, None).await
    }

    /// Any live state -> `failed`, recording the taxonomy-coded error.
    pub async fn fail(&self, job_id: &str, error: &str) -> Result<()> {
        self.transition(job_id, JobStatus::Failed, Some(error)).await
    }

    /// Any live state -> `cancelled`.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        self.transition(job_id, JobStatus::Cancelled, None).await
    }

    /// Progress write: percent clamps into 0..=99 and never decreases.
    pub async fn mark_progress(
        &self,
        job_id: &str,
        percent: i64,
        message: Option<&str>,
    ) -> Result<()> {
        let current = self.load(job_id).await?;
        if current.status.is_terminal() {
            return Err(AppError::IllegalState {
                job_id: job_id.to_string(),
                from: current.status.to_string(),
                to: "running (progress)".to_string(),
            });
        }

        let percent = percent.clamp(0, 99);
        let now = Utc::now().to_rfc3339();

        with_write_retries(|| {
            sqlx::query(
                r#"
                UPDATE analysis_jobs
                SET progress = MAX(progress, ?),
                    current_phase = COALESCE(?, current_phase),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(percent)
            .bind(message)
            .bind(&now)
            .bind(job_id)
            .execute(&self.pool)
        })
        .await?;

        Ok(())
    }

    async fn transition(
        &self,
        job_id: &str,
        to: JobStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let current = self.load(job_id).await?;

        if current.status == to {
            // Duplicate transition (terminal or running): no-op.
            return Ok(());
        }
        if !current.status.can_transition(to) {
            return Err(AppError::IllegalState {
                job_id: job_id.to_string(),
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }

        let now = Utc::now().to_rfc3339();
        let completed_at = to.is_terminal().then(|| now.clone());
        let progress_floor = if to == JobStatus::Completed { 100 } else { 0 };

        with_write_retries(|| {
            sqlx::query(
                r#"
                UPDATE analysis_jobs
                SET status = ?,
                    progress = MAX(progress, ?),
                    error = COALESCE(?, error),
                    updated_at = ?,
                    completed_at = COALESCE(?, completed_at)
                WHERE id = ?
                "#,
            )
            .bind(to.as_str())
            .bind(progress_floor)
            .bind(error)
            .bind(&now)
            .bind(&completed_at)
            .bind(job_id)
            .execute(&self.pool)
        })
        .await?;

        log::info!("Updated job {} to status: {}", job_id, to);
        Ok(())
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Job {
    Job {
        id: row.get("id"),
        url: row.get("url"),
        plan: map_plan(row.get("plan")),
        status: map_job_status(row.get("status")),
        progress: row.get("progress"),
        current_phase: row.get("current_phase"),
        max_pages: row.get("max_pages"),
        created_at: parse_datetime(row.get("created_at")),
        updated_at: parse_datetime(row.get("updated_at")),
        completed_at: row
            .get::<Option<&str>, _>("completed_at")
            .map(parse_datetime),
        submitter_id: row.get("user_id"),
        error: row.get("error"),
    }
}
