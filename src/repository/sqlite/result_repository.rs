//! Per-module result rows, unique on (job_id, module_name).
//!
//! Rows are created lazily when a module first starts and updated in place on
//! completion or failure; re-running an upsert with identical content leaves
//! the row unchanged.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::domain::analysis::AnalysisResult;
use crate::domain::axes::AxisKey;
use crate::domain::models::{ModuleRecord, ModuleStatus};
use crate::error::{AppError, Result};

use super::{map_module_status, parse_datetime, with_write_retries};

pub struct ResultRepository {
    pool: SqlitePool,
}

impl ResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// First observation of a module: create its row in `running`.
    pub async fn upsert_running(&self, job_id: &str, axis: AxisKey) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        with_write_retries(|| {
            sqlx::query(
                r#"
                INSERT INTO analysis_results (id, job_id, module_name, status, created_at)
                VALUES (?, ?, ?, 'running', ?)
                ON CONFLICT (job_id, module_name)
                DO UPDATE SET status = 'running'
                "#,
            )
            .bind(&id)
            .bind(job_id)
            .bind(axis.as_str())
            .bind(&now)
            .execute(&self.pool)
        })
        .await?;

        Ok(())
    }

    /// Successful module outcome: parsed result plus the raw text for audit.
    pub async fn upsert_completed(
        &self,
        job_id: &str,
        axis: AxisKey,
        result: &AnalysisResult,
        raw_output: &str,
        token_usage: i64,
    ) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let result_json = serde_json::to_string(result)
            .map_err(|e| AppError::Other(anyhow::anyhow!("serialize module result: {e}")))?;

        with_write_retries(|| {
            sqlx::query(
                r#"
                INSERT INTO analysis_results
                    (id, job_id, module_name, status, result, raw_output, token_usage,
                     created_at, completed_at, error)
                VALUES (?, ?, ?, 'completed', ?, ?, ?, ?, ?, NULL)
                ON CONFLICT (job_id, module_name)
                DO UPDATE SET status = 'completed',
                              result = excluded.result,
                              raw_output = excluded.raw_output,
                              token_usage = excluded.token_usage,
                              completed_at = excluded.completed_at,
                              error = NULL
                "#,
            )
            .bind(&id)
            .bind(job_id)
            .bind(axis.as_str())
            .bind(&result_json)
            .bind(raw_output)
            .bind(token_usage)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
        })
        .await?;

        log::info!("Module {} completed for job {}", axis, job_id);
        Ok(())
    }

    /// Terminal module failure: raw text retained, error recorded.
    pub async fn upsert_failed(
        &self,
        job_id: &str,
        axis: AxisKey,
        raw_output: Option<&str>,
        error: &str,
        token_usage: i64,
    ) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        with_write_retries(|| {
            sqlx::query(
                r#"
                INSERT INTO analysis_results
                    (id, job_id, module_name, status, raw_output, token_usage,
                     created_at, completed_at, error)
                VALUES (?, ?, ?, 'failed', ?, ?, ?, ?, ?)
                ON CONFLICT (job_id, module_name)
                DO UPDATE SET status = 'failed',
                              raw_output = excluded.raw_output,
                              token_usage = excluded.token_usage,
                              completed_at = excluded.completed_at,
                              error = excluded.error
                "#,
            )
            .bind(&id)
            .bind(job_id)
            .bind(axis.as_str())
            .bind(raw_output)
            .bind(token_usage)
            .bind(&now)
            .bind(&now)
            .bind(error)
            .execute(&self.pool)
        })
        .await?;

        log::warn!("Module {} failed for job {}: {}", axis, job_id, error);
        Ok(())
    }

    /// All module rows for a job, in axis order.
    pub async fn list(&self, job_id: &str) -> Result<Vec<ModuleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, module_name, status, result, raw_output, token_usage,
                   created_at, completed_at, error
            FROM analysis_results
            WHERE job_id = ?
            ORDER BY module_name ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::PersistenceTransient(e.to_string()))?;

        Ok(rows.iter().filter_map(row_to_record).collect())
    }

    /// Count of rows in a given status for a job.
    pub async fn count_with_status(&self, job_id: &str, status: ModuleStatus) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM analysis_results WHERE job_id = ? AND status = ?",
        )
        .bind(job_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::PersistenceTransient(e.to_string()))?;

        Ok(row.get("n"))
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Option<ModuleRecord> {
    let axis = AxisKey::from_str(row.get("module_name")).ok()?;
    let result = row
        .get::<Option<&str>, _>("result")
        .and_then(|json| serde_json::from_str::<AnalysisResult>(json).ok());

    Some(ModuleRecord {
        job_id: row.get("job_id"),
        axis,
        status: map_module_status(row.get("status")),
        result,
        raw_output: row.get("raw_output"),
        token_usage: row.get("token_usage"),
        created_at: parse_datetime(row.get("created_at")),
        completed_at: row
            .get::<Option<&str>, _>("completed_at")
            .map(parse_datetime),
        error: row.get("error"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PlanTier;
    use crate::repository::JobRepository;
    use crate::test_utils::fixtures;

    async fn setup() -> (ResultRepository, String) {
        let pool = fixtures::setup_test_db().await;
        let job_id = JobRepository::new(pool.clone())
            .create("https://example.com", PlanTier::Pro, 5, None)
            .await
            .unwrap();
        (ResultRepository::new(pool), job_id)
    }

    #[tokio::test]
    async fn running_then_completed_updates_in_place() {
        let (repo, job_id) = setup().await;
        let axis = AxisKey::TextAlternatives;

        repo.upsert_running(&job_id, axis).await.unwrap();
        let records = repo.list(&job_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ModuleStatus::Running);

        let result = fixtures::analysis_result(90);
        repo.upsert_completed(&job_id, axis, &result, "{\"raw\":1}", 321)
            .await
            .unwrap();

        let records = repo.list(&job_id).await.unwrap();
        assert_eq!(records.len(), 1, "upsert must not duplicate the row");
        assert_eq!(records[0].status, ModuleStatus::Completed);
        assert_eq!(records[0].token_usage, 321);
        assert_eq!(records[0].result.as_ref().unwrap().summary.score, 90);
        assert!(records[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn repeated_upsert_with_identical_content_is_idempotent() {
        let (repo, job_id) = setup().await;
        let axis = AxisKey::Navigable;
        let result = fixtures::analysis_result(75);

        repo.upsert_completed(&job_id, axis, &result, "raw", 10)
            .await
            .unwrap();
        repo.upsert_completed(&job_id, axis, &result, "raw", 10)
            .await
            .unwrap();

        let records = repo.list(&job_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result.as_ref().unwrap().summary.score, 75);
    }

    #[tokio::test]
    async fn failed_module_retains_raw_output_and_error() {
        let (repo, job_id) = setup().await;
        let axis = AxisKey::Seizures;

        repo.upsert_running(&job_id, axis).await.unwrap();
        repo.upsert_failed(&job_id, axis, Some("not json at all"), "ParseFailed: nope", 55)
            .await
            .unwrap();

        let records = repo.list(&job_id).await.unwrap();
        assert_eq!(records[0].status, ModuleStatus::Failed);
        assert_eq!(records[0].raw_output.as_deref(), Some("not json at all"));
        assert_eq!(records[0].error.as_deref(), Some("ParseFailed: nope"));
        assert!(records[0].result.is_none());
    }

    #[tokio::test]
    async fn counts_by_status() {
        let (repo, job_id) = setup().await;
        let result = fixtures::analysis_result(80);

        repo.upsert_completed(&job_id, AxisKey::Readable, &result, "r", 1)
            .await
            .unwrap();
        repo.upsert_completed(&job_id, AxisKey::Predictable, &result, "r", 1)
            .await
            .unwrap();
        repo.upsert_failed(&job_id, AxisKey::Compatible, None, "x", 0)
            .await
            .unwrap();

        assert_eq!(
            repo.count_with_status(&job_id, ModuleStatus::Completed)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            repo.count_with_status(&job_id, ModuleStatus::Failed)
                .await
                .unwrap(),
            1
        );
    }
}
