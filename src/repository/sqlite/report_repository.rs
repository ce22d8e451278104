//! Final report rows, unique per job.

use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::domain::models::{ConformanceLevel, FinalReport};
use crate::error::{AppError, Result};

use super::{parse_datetime, with_write_retries};

pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent report write keyed by job id.
    pub async fn upsert(&self, report: &FinalReport) -> Result<()> {
        let id = uuid::Uuid::new_v4().to_string();
        let technical = to_json(&report.technical_analysis)?;
        let experts = to_json(&report.expert_analyses)?;
        let recommendations = to_json(&report.recommendations)?;
        let created_at = report.created_at.to_rfc3339();

        with_write_retries(|| {
            sqlx::query(
                r#"
                INSERT INTO analysis_reports
                    (id, job_id, technical_analysis, expert_analyses, executive_summary,
                     recommendations, conformance_level, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (job_id)
                DO UPDATE SET technical_analysis = excluded.technical_analysis,
                              expert_analyses = excluded.expert_analyses,
                              executive_summary = excluded.executive_summary,
                              recommendations = excluded.recommendations,
                              conformance_level = excluded.conformance_level
                "#,
            )
            .bind(&id)
            .bind(&report.job_id)
            .bind(&technical)
            .bind(&experts)
            .bind(&report.executive_summary)
            .bind(&recommendations)
            .bind(report.conformance_level.as_str())
            .bind(&created_at)
            .execute(&self.pool)
        })
        .await?;

        log::info!(
            "Report persisted for job {} ({})",
            report.job_id,
            report.conformance_level
        );
        Ok(())
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<FinalReport>> {
        let row = sqlx::query(
            r#"
            SELECT job_id, technical_analysis, expert_analyses, executive_summary,
                   recommendations, conformance_level, created_at
            FROM analysis_reports
            WHERE job_id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::PersistenceTransient(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(FinalReport {
            job_id: row.get("job_id"),
            technical_analysis: from_json(row.get("technical_analysis"))?,
            expert_analyses: from_json(row.get("expert_analyses"))?,
            executive_summary: row.get("executive_summary"),
            recommendations: from_json(row.get("recommendations"))?,
            conformance_level: ConformanceLevel::from_str(row.get("conformance_level"))
                .unwrap_or(ConformanceLevel::Critical),
            created_at: parse_datetime(row.get("created_at")),
        }))
    }

    pub async fn exists(&self, job_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM analysis_reports WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::PersistenceTransient(e.to_string()))?;
        Ok(row.get::<i64, _>("n") > 0)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Other(anyhow::anyhow!("serialize report field: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| AppError::Other(anyhow::anyhow!("deserialize report field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PlanTier;
    use crate::repository::JobRepository;
    use crate::test_utils::fixtures;

    #[tokio::test]
    async fn upsert_is_unique_per_job() {
        let pool = fixtures::setup_test_db().await;
        let job_id = JobRepository::new(pool.clone())
            .create("https://example.com", PlanTier::Pro, 5, None)
            .await
            .unwrap();
        let repo = ReportRepository::new(pool);

        assert!(!repo.exists(&job_id).await.unwrap());

        let mut report = fixtures::final_report(&job_id, 85);
        repo.upsert(&report).await.unwrap();
        assert!(repo.exists(&job_id).await.unwrap());

        // Second write replaces, never duplicates.
        report.executive_summary = "updated".into();
        repo.upsert(&report).await.unwrap();

        let loaded = repo.get(&job_id).await.unwrap().unwrap();
        assert_eq!(loaded.executive_summary, "updated");
        assert_eq!(loaded.conformance_level, ConformanceLevel::Aa);
        assert_eq!(loaded.job_id, job_id);
    }

    #[tokio::test]
    async fn missing_report_is_none() {
        let pool = fixtures::setup_test_db().await;
        let repo = ReportRepository::new(pool);
        assert!(repo.get("nope").await.unwrap().is_none());
    }
}
