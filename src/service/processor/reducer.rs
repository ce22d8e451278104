//! Aggregation of module results into the final report.
//!
//! Failed modules are excluded from the mean rather than counted as zero; the
//! report records how many modules contributed. Fewer than six completed
//! modules aborts the job with `InsufficientCoverage`.

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;

use crate::checker::AutomatedChecks;
use crate::domain::analysis::{ComplianceLevel, PriorityAction, PriorityActions};
use crate::domain::models::{ConformanceLevel, FinalReport, Job, ModuleRecord, ModuleStatus};
use crate::error::{AppError, Result};
use crate::extractor::SiteSnapshot;

/// Minimum number of completed modules for a usable report.
pub const MIN_COMPLETED_MODULES: usize = 6;

/// How many immediate actions the executive summary names.
const SUMMARY_TOP_ACTIONS: usize = 5;

pub struct Reducer;

impl Reducer {
    pub fn reduce(
        job: &Job,
        site: &SiteSnapshot,
        checks: &AutomatedChecks,
        modules: &[ModuleRecord],
    ) -> Result<FinalReport> {
        let completed: Vec<&ModuleRecord> = modules
            .iter()
            .filter(|m| m.status == ModuleStatus::Completed && m.result.is_some())
            .collect();

        if completed.len() < MIN_COMPLETED_MODULES {
            return Err(AppError::InsufficientCoverage {
                completed: completed.len(),
                required: MIN_COMPLETED_MODULES,
            });
        }

        // Mean over successful modules only.
        let score_sum: i64 = completed
            .iter()
            .filter_map(|m| m.result.as_ref())
            .map(|r| r.summary.score)
            .sum();
        let overall_score = score_sum as f64 / completed.len() as f64;

        let mut conformance = ConformanceLevel::from_score(overall_score);

        // Safety cap: a Level-A axis judged NONE caps the site at PARTIAL.
        let level_a_floor_broken = completed.iter().any(|m| {
            m.axis.has_level_a_criteria()
                && m.result
                    .as_ref()
                    .is_some_and(|r| r.summary.compliance_level == ComplianceLevel::None)
        });
        if level_a_floor_broken && matches!(conformance, ConformanceLevel::Aaa | ConformanceLevel::Aa | ConformanceLevel::A) {
            conformance = ConformanceLevel::Partial;
        }

        let passed: usize = completed
            .iter()
            .filter_map(|m| m.result.as_ref())
            .map(|r| r.passed_count())
            .sum();
        let warnings: usize = completed
            .iter()
            .filter_map(|m| m.result.as_ref())
            .map(|r| r.warning_count())
            .sum();
        let violations: usize = completed
            .iter()
            .filter_map(|m| m.result.as_ref())
            .map(|r| r.violation_count())
            .sum();

        let recommendations = merge_recommendations(&completed);

        let expert_analyses: BTreeMap<String, _> = completed
            .iter()
            .filter_map(|m| {
                m.result
                    .as_ref()
                    .map(|r| (m.axis.as_str().to_string(), r.clone()))
            })
            .collect();

        let per_axis_scores: BTreeMap<String, i64> = completed
            .iter()
            .filter_map(|m| {
                m.result
                    .as_ref()
                    .map(|r| (m.axis.as_str().to_string(), r.summary.score))
            })
            .collect();

        let token_usage: i64 = modules.iter().map(|m| m.token_usage).sum();
        let failed = modules
            .iter()
            .filter(|m| m.status == ModuleStatus::Failed)
            .count();

        let technical_analysis = json!({
            "overall_score": (overall_score * 10.0).round() / 10.0,
            "modules_completed": completed.len(),
            "modules_failed": failed,
            "module_scores": per_axis_scores,
            "criteria": {
                "passed": passed,
                "warnings": warnings,
                "violations": violations,
            },
            "crawl": {
                "root_url": &site.root_url,
                "pages_analyzed": site.pages.len(),
                "pages_failed": site.failed_pages,
                "robots_txt": site.context.robots_txt,
                "sitemap": site.context.sitemap,
                "ssl": site.context.ssl,
            },
            "automated_checks": {
                "violations": checks.violation_count(),
                "warnings": checks.warning_count(),
                "passes": checks.passes.len(),
            },
            "token_usage": token_usage,
        });

        let executive_summary = executive_summary(
            job,
            overall_score,
            conformance,
            completed.len(),
            passed,
            warnings,
            violations,
            &recommendations,
        );

        Ok(FinalReport {
            job_id: job.id.clone(),
            technical_analysis,
            expert_analyses,
            executive_summary,
            recommendations,
            conformance_level: conformance,
            created_at: Utc::now(),
        })
    }
}

/// Merge priority actions across modules: dedupe by title, keep each action
/// in the highest-priority bucket it appears in.
fn merge_recommendations(completed: &[&ModuleRecord]) -> PriorityActions {
    let mut merged = PriorityActions::default();
    let mut seen: BTreeMap<String, usize> = BTreeMap::new(); // title -> bucket rank

    let buckets = |actions: &PriorityActions| {
        [
            (0usize, actions.immediate.clone()),
            (1usize, actions.short_term.clone()),
            (2usize, actions.long_term.clone()),
        ]
    };

    for module in completed {
        let Some(actions) = module.result.as_ref().and_then(|r| r.priority_actions.as_ref())
        else {
            continue;
        };
        for (rank, items) in buckets(actions) {
            for action in items {
                let key = action.title.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                match seen.get(&key) {
                    Some(&existing) if existing <= rank => continue,
                    _ => {}
                }
                remove_action(&mut merged, &key);
                seen.insert(key, rank);
                bucket_mut(&mut merged, rank).push(action);
            }
        }
    }

    merged
}

fn bucket_mut(actions: &mut PriorityActions, rank: usize) -> &mut Vec<PriorityAction> {
    match rank {
        0 => &mut actions.immediate,
        1 => &mut actions.short_term,
        _ => &mut actions.long_term,
    }
}

fn remove_action(actions: &mut PriorityActions, key: &str) {
    for bucket in [
        &mut actions.immediate,
        &mut actions.short_term,
        &mut actions.long_term,
    ] {
        bucket.retain(|a| a.title.trim().to_lowercase() != key);
    }
}

#[allow(clippy::too_many_arguments)]
fn executive_summary(
    job: &Job,
    overall_score: f64,
    conformance: ConformanceLevel,
    modules_completed: usize,
    passed: usize,
    warnings: usize,
    violations: usize,
    recommendations: &PriorityActions,
) -> String {
    let mut summary = format!(
        "Accessibility audit of {} ({} plan), completed {}.\n\
         Overall conformance: {} (score {:.1}/100, {} of 12 analysis modules contributed).\n\
         Criteria results: {} passed, {} warnings, {} violations.",
        job.url,
        job.plan.as_str(),
        Utc::now().format("%Y-%m-%d"),
        conformance,
        overall_score,
        modules_completed,
        passed,
        warnings,
        violations,
    );

    if !recommendations.immediate.is_empty() {
        summary.push_str("\nMost urgent actions:");
        for action in recommendations.immediate.iter().take(SUMMARY_TOP_ACTIONS) {
            summary.push_str("\n- ");
            summary.push_str(&action.title);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::axes::AxisKey;
    use crate::domain::models::SiteContext;
    use crate::test_utils::fixtures;

    fn site() -> SiteSnapshot {
        SiteSnapshot {
            root_url: "https://example.com/".into(),
            context: SiteContext::default(),
            pages: Vec::new(),
            failed_pages: 0,
        }
    }

    fn records(scores: &[i64]) -> Vec<ModuleRecord> {
        AxisKey::ALL
            .iter()
            .zip(scores)
            .map(|(axis, score)| fixtures::module_record(*axis, *score))
            .collect()
    }

    #[test]
    fn perfect_scores_reach_aaa() {
        let modules = records(&[100; 12]);
        let report = Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .unwrap();
        assert_eq!(report.conformance_level, ConformanceLevel::Aaa);
        assert_eq!(report.expert_analyses.len(), 12);
    }

    #[test]
    fn zero_scores_reach_critical() {
        let modules = records(&[0; 12]);
        let report = Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .unwrap();
        assert_eq!(report.conformance_level, ConformanceLevel::Critical);
    }

    #[test]
    fn failed_modules_are_excluded_from_the_mean() {
        let mut modules = records(&[90; 12]);
        // Fail two modules; mean should stay 90, not drop.
        modules[0] = fixtures::failed_module_record(AxisKey::TextAlternatives, "LLMPermanent: 400");
        modules[1] = fixtures::failed_module_record(AxisKey::TimeBasedMedia, "ParseFailed: x");

        let report = Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .unwrap();

        assert_eq!(report.conformance_level, ConformanceLevel::Aa);
        assert_eq!(report.technical_analysis["modules_completed"], 10);
        assert_eq!(report.technical_analysis["modules_failed"], 2);
        assert_eq!(report.technical_analysis["overall_score"], 90.0);
        assert!(report.expert_analyses.get("1.1").is_none());
    }

    #[test]
    fn five_completed_modules_is_insufficient() {
        let mut modules = records(&[80; 12]);
        for (i, record) in modules.iter_mut().enumerate() {
            if i >= 5 {
                *record = fixtures::failed_module_record(record.axis, "LLMPermanent: 400");
            }
        }

        let err = Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .unwrap_err();
        assert_eq!(err.code(), "InsufficientCoverage");
    }

    #[test]
    fn six_completed_modules_is_sufficient() {
        let mut modules = records(&[80; 12]);
        for (i, record) in modules.iter_mut().enumerate() {
            if i >= 6 {
                *record = fixtures::failed_module_record(record.axis, "LLMPermanent: 400");
            }
        }

        assert!(Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .is_ok());
    }

    #[test]
    fn level_a_none_caps_conformance_at_partial() {
        let mut modules = records(&[95; 12]);
        // One axis reports NONE despite the high mean.
        modules[4] = fixtures::module_record_with_level(
            AxisKey::KeyboardAccessible,
            95,
            ComplianceLevel::None,
        );

        let report = Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .unwrap();
        assert_eq!(report.conformance_level, ConformanceLevel::Partial);
    }

    #[test]
    fn recommendations_dedupe_by_title_keeping_highest_bucket() {
        let mut modules = records(&[85; 12]);
        modules[0] = fixtures::module_record_with_actions(
            AxisKey::TextAlternatives,
            85,
            PriorityActions {
                immediate: vec![],
                short_term: vec![PriorityAction {
                    title: "Fix alt texts".into(),
                    description: "short".into(),
                }],
                long_term: vec![],
            },
        );
        modules[1] = fixtures::module_record_with_actions(
            AxisKey::TimeBasedMedia,
            85,
            PriorityActions {
                immediate: vec![PriorityAction {
                    title: "Fix Alt Texts".into(),
                    description: "urgent".into(),
                }],
                short_term: vec![],
                long_term: vec![],
            },
        );

        let report = Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .unwrap();

        // Case-insensitive title match lands once, in the immediate bucket.
        assert_eq!(report.recommendations.immediate.len(), 1);
        assert!(report.recommendations.short_term.is_empty());
    }

    #[test]
    fn executive_summary_names_url_level_and_top_actions() {
        let mut modules = records(&[85; 12]);
        modules[0] = fixtures::module_record_with_actions(
            AxisKey::TextAlternatives,
            85,
            PriorityActions {
                immediate: vec![PriorityAction {
                    title: "Fix hero image alt text".into(),
                    description: String::new(),
                }],
                short_term: vec![],
                long_term: vec![],
            },
        );

        let report = Reducer::reduce(
            &fixtures::job("https://example.com/"),
            &site(),
            &AutomatedChecks::default(),
            &modules,
        )
        .unwrap();

        assert!(report.executive_summary.contains("https://example.com/"));
        assert!(report.executive_summary.contains("AA"));
        assert!(report.executive_summary.contains("Fix hero image alt text"));
    }
}
