//! Domain models for the audit engine.
//!
//! Key entities:
//! - `Job` is one audit of one root URL under one plan tier
//! - `ModuleRecord` is the persisted outcome of one axis module
//! - `FinalReport` is the reducer's aggregate over all modules
//! - `PageSnapshot`/`CrawlOutcome` carry the crawler's raw capture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::analysis::{AnalysisResult, PriorityActions};
use super::axes::AxisKey;

// ============================================================================
// JOB
// ============================================================================

/// Status of an audit job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// FSM: pending -> running -> completed | failed | cancelled, with
    /// pending -> cancelled/failed permitted and terminal states absorbing.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        match (self, to) {
            (Self::Pending, Self::Running) => true,
            (Self::Pending, Self::Failed | Self::Cancelled) => true,
            (Self::Running, Self::Running) => true,
            (Self::Running, Self::Completed | Self::Failed | Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "queued" => Ok(Self::Pending),
            "running" | "processing" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" | "error" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan tier a job runs under. The tier bounds the crawl size; module
/// selection is identical across tiers (the caller decides what to run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Pro,
    Enterprise,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Upper bound on crawled pages for the tier.
    pub fn page_cap(&self) -> i64 {
        match self {
            Self::Basic => 5,
            Self::Pro => 15,
            Self::Enterprise => 50,
        }
    }

    /// Effective page count: the request clamped into 1..=cap, falling back
    /// to the configured default when absent.
    pub fn effective_max_pages(&self, requested: Option<i64>, default_pages: i64) -> i64 {
        requested.unwrap_or(default_pages).clamp(1, self.page_cap())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(()),
        }
    }
}

/// One audit job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub url: String,
    pub plan: PlanTier,
    pub status: JobStatus,
    pub progress: i64,
    pub current_phase: Option<String>,
    pub max_pages: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub submitter_id: Option<String>,
    pub error: Option<String>,
}

/// Submission payload from the external façade.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
    pub plan: PlanTier,
    #[serde(default)]
    pub max_pages: Option<i64>,
    #[serde(default)]
    pub submitter_id: Option<String>,
}

/// Snapshot returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobPollResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: i64,
    pub current_phase: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Set once a final report row exists for the job.
    pub report_available: bool,
}

/// Lightweight job info for listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub url: String,
    pub plan: PlanTier,
    pub status: JobStatus,
    pub progress: i64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// MODULE RESULT
// ============================================================================

/// Status of one axis module within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ModuleStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" | "error" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

/// Persisted outcome of one axis module. Raw model output is retained for
/// audit even when parsing failed.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRecord {
    pub job_id: String,
    pub axis: AxisKey,
    pub status: ModuleStatus,
    pub result: Option<AnalysisResult>,
    pub raw_output: Option<String>,
    pub token_usage: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

// ============================================================================
// FINAL REPORT
// ============================================================================

/// Site-wide conformance label derived from the aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConformanceLevel {
    Aaa,
    Aa,
    A,
    Partial,
    Poor,
    Critical,
}

impl ConformanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aaa => "AAA",
            Self::Aa => "AA",
            Self::A => "A",
            Self::Partial => "PARTIAL",
            Self::Poor => "POOR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Fixed thresholds over the aggregate score.
    pub fn from_score(score: f64) -> Self {
        if score >= 98.0 {
            Self::Aaa
        } else if score >= 80.0 {
            Self::Aa
        } else if score >= 65.0 {
            Self::A
        } else if score >= 40.0 {
            Self::Partial
        } else if score >= 20.0 {
            Self::Poor
        } else {
            Self::Critical
        }
    }
}

impl std::str::FromStr for ConformanceLevel {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AAA" => Ok(Self::Aaa),
            "AA" => Ok(Self::Aa),
            "A" => Ok(Self::A),
            "PARTIAL" => Ok(Self::Partial),
            "POOR" => Ok(Self::Poor),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ConformanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregated audit report for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    pub job_id: String,
    /// Crawl statistics, automated-check counters, per-axis score table.
    pub technical_analysis: Value,
    /// Axis key -> parsed module result (completed modules only).
    pub expert_analyses: BTreeMap<String, AnalysisResult>,
    pub executive_summary: String,
    pub recommendations: PriorityActions,
    pub conformance_level: ConformanceLevel,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// CRAWL CAPTURE
// ============================================================================

/// One fetched page: raw DOM plus response metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    /// Canonical URL the page was enqueued under.
    pub url: String,
    /// URL after redirects, when it differs.
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
    pub fetch_time_ms: u64,
    pub content_length: usize,
    pub title: Option<String>,
    pub lang: Option<String>,
    /// Raw serialized DOM. Empty when the fetch failed.
    #[serde(skip_serializing)]
    pub html: String,
    pub error: Option<String>,
}

impl PageSnapshot {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Site-level context probes recorded alongside the crawl.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteContext {
    pub robots_txt: bool,
    pub sitemap: bool,
    pub ssl: bool,
}

/// Ordered crawl capture; the first page is always the root.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    pub root_url: String,
    pub pages: Vec<PageSnapshot>,
    pub failed_pages: usize,
    pub context: SiteContext,
}

impl CrawlOutcome {
    pub fn fetched_pages(&self) -> impl Iterator<Item = &PageSnapshot> {
        self.pages.iter().filter(|p| p.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsm_permits_expected_transitions() {
        use JobStatus::*;
        assert!(Pending.can_transition(Running));
        assert!(Pending.can_transition(Cancelled));
        assert!(Running.can_transition(Running));
        assert!(Running.can_transition(Completed));
        assert!(Running.can_transition(Failed));
        assert!(Running.can_transition(Cancelled));

        assert!(!Pending.can_transition(Completed));
        assert!(!Completed.can_transition(Running));
        assert!(!Failed.can_transition(Completed));
        assert!(!Cancelled.can_transition(Running));
    }

    #[test]
    fn plan_tier_bounds_pages() {
        assert_eq!(PlanTier::Basic.effective_max_pages(None, 5), 5);
        assert_eq!(PlanTier::Basic.effective_max_pages(Some(50), 5), 5);
        assert_eq!(PlanTier::Pro.effective_max_pages(Some(8), 5), 8);
        assert_eq!(PlanTier::Enterprise.effective_max_pages(Some(0), 5), 1);
    }

    #[test]
    fn conformance_thresholds() {
        assert_eq!(ConformanceLevel::from_score(100.0), ConformanceLevel::Aaa);
        assert_eq!(ConformanceLevel::from_score(98.0), ConformanceLevel::Aaa);
        assert_eq!(ConformanceLevel::from_score(80.0), ConformanceLevel::Aa);
        assert_eq!(ConformanceLevel::from_score(70.0), ConformanceLevel::A);
        assert_eq!(ConformanceLevel::from_score(45.0), ConformanceLevel::Partial);
        assert_eq!(ConformanceLevel::from_score(25.0), ConformanceLevel::Poor);
        assert_eq!(ConformanceLevel::from_score(0.0), ConformanceLevel::Critical);
    }

    #[test]
    fn status_round_trips() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
    }
}
