//! The `analysis_result` schema produced by every module, plus the
//! canonicalization applied to raw model output.
//!
//! Model responses arrive in one of two equivalent shapes: the canonical
//! English schema or a legacy German schema (`gesamtbewertung`,
//! `detailbewertung`, `priorisierte_massnahmen`, `zusammenfassung`).
//! [`parse_model_output`] maps the legacy keys, coerces out-of-range scores,
//! normalizes enum casing, and rejects output missing the required fields.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, Result};

// ============================================================================
// RESULT SCHEMA
// ============================================================================

/// Per-module compliance label, as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceLevel {
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AA+")]
    AaPlus,
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "PARTIAL")]
    Partial,
    #[serde(rename = "NONE")]
    None,
}

impl ComplianceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aaa => "AAA",
            Self::AaPlus => "AA+",
            Self::Aa => "AA",
            Self::APlus => "A+",
            Self::A => "A",
            Self::Partial => "PARTIAL",
            Self::None => "NONE",
        }
    }

    /// Fallback derivation from the module score when the reported label is
    /// missing or unrecognized (thresholds match the prompt rubric).
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s >= 98 => Self::Aaa,
            s if s >= 90 => Self::AaPlus,
            s if s >= 80 => Self::Aa,
            s if s >= 72 => Self::APlus,
            s if s >= 65 => Self::A,
            s if s >= 40 => Self::Partial,
            _ => Self::None,
        }
    }
}

/// Evaluation status of a single success criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CriterionStatus {
    Passed,
    Partial,
    Warning,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub score: i64,
    pub compliance_level: ComplianceLevel,
    pub overall_assessment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionEvaluation {
    pub criterion_id: String,
    #[serde(default)]
    pub name: String,
    pub status: CriterionStatus,
    #[serde(default)]
    pub finding: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default = "default_severity")]
    pub severity: String,
}

fn default_severity() -> String {
    "moderate".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityAction {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Priority-action buckets, most urgent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityActions {
    #[serde(default)]
    pub immediate: Vec<PriorityAction>,
    #[serde(default)]
    pub short_term: Vec<PriorityAction>,
    #[serde(default)]
    pub long_term: Vec<PriorityAction>,
}

impl PriorityActions {
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.short_term.is_empty() && self.long_term.is_empty()
    }
}

/// Parsed result object of one module run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    pub criteria_evaluation: Vec<CriterionEvaluation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_actions: Option<PriorityActions>,
}

impl AnalysisResult {
    pub fn passed_count(&self) -> usize {
        self.criteria_evaluation
            .iter()
            .filter(|c| c.status == CriterionStatus::Passed)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.criteria_evaluation
            .iter()
            .filter(|c| matches!(c.status, CriterionStatus::Warning | CriterionStatus::Partial))
            .count()
    }

    pub fn violation_count(&self) -> usize {
        self.criteria_evaluation
            .iter()
            .filter(|c| c.status == CriterionStatus::Failed)
            .count()
    }
}

// ============================================================================
// CANONICALIZATION
// ============================================================================

/// Parse and validate one module's model output.
///
/// The input is the already-JSON-parsed value (tolerant repair happens
/// upstream on the raw text). Required fields: `summary.score`,
/// `summary.compliance_level`, `summary.overall_assessment`,
/// `criteria_evaluation`. Scores are coerced into 0..=100; an unrecognized
/// compliance label falls back to the score-derived one.
pub fn parse_model_output(value: Value) -> Result<AnalysisResult> {
    let mut root = match value {
        Value::Object(map) => map,
        other => {
            return Err(AppError::ParseFailed(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    };

    // Legacy German schema: rename top-level keys in place.
    for (legacy, canonical) in [
        ("gesamtbewertung", "summary"),
        ("detailbewertung", "criteria_evaluation"),
        ("priorisierte_massnahmen", "priority_actions"),
    ] {
        if let Some(v) = root.remove(legacy) {
            root.entry(canonical.to_string()).or_insert(v);
        }
    }

    let mut summary = match root.remove("summary") {
        Some(Value::Object(map)) => map,
        _ => return Err(AppError::ParseFailed("missing summary object".into())),
    };
    if let Some(v) = summary.remove("zusammenfassung") {
        summary.entry("overall_assessment".to_string()).or_insert(v);
    }
    // Some legacy outputs put the summary text at the top level.
    if !summary.contains_key("overall_assessment") {
        if let Some(v) = root.remove("zusammenfassung") {
            summary.insert("overall_assessment".to_string(), v);
        }
    }

    let score = summary
        .get("score")
        .and_then(Value::as_f64)
        .ok_or_else(|| AppError::ParseFailed("missing summary.score".into()))?;
    let score = (score.round() as i64).clamp(0, 100);

    let assessment = summary
        .get("overall_assessment")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::ParseFailed("missing summary.overall_assessment".into()))?
        .to_string();

    let level = summary
        .get("compliance_level")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_uppercase())
        .and_then(|s| serde_json::from_value::<ComplianceLevel>(json!(s)).ok())
        .unwrap_or_else(|| ComplianceLevel::from_score(score));

    let criteria_raw = match root.remove("criteria_evaluation") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(AppError::ParseFailed(
                "missing criteria_evaluation array".into(),
            ))
        }
    };
    let criteria = criteria_raw
        .into_iter()
        .filter_map(normalize_criterion)
        .collect::<Vec<_>>();

    let priority_actions = root
        .remove("priority_actions")
        .map(normalize_actions)
        .filter(|a| !a.is_empty());

    Ok(AnalysisResult {
        summary: AnalysisSummary {
            score,
            compliance_level: level,
            overall_assessment: assessment,
        },
        criteria_evaluation: criteria,
        priority_actions,
    })
}

/// Normalize one criterion entry; entries without an id are dropped.
fn normalize_criterion(value: Value) -> Option<CriterionEvaluation> {
    let mut map = match value {
        Value::Object(map) => map,
        _ => return None,
    };

    let criterion_id = map.get("criterion_id").and_then(Value::as_str)?.to_string();
    let status = map
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_uppercase())
        .and_then(|s| serde_json::from_value::<CriterionStatus>(json!(s)).ok())
        .unwrap_or(CriterionStatus::Warning);

    let examples = map
        .remove("examples")
        .and_then(|v| match v {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();

    let text = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Some(CriterionEvaluation {
        criterion_id,
        name: text("name"),
        status,
        finding: text("finding"),
        impact: text("impact"),
        recommendation: text("recommendation"),
        examples,
        severity: map
            .get("severity")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_severity),
    })
}

/// Normalize the priority-action buckets; plain strings become titles.
fn normalize_actions(value: Value) -> PriorityActions {
    let map = match value {
        Value::Object(map) => map,
        _ => return PriorityActions::default(),
    };

    let bucket = |key: &str| -> Vec<PriorityAction> {
        map.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(title) => Some(PriorityAction {
                            title: title.clone(),
                            description: String::new(),
                        }),
                        Value::Object(obj) => {
                            let title = obj.get("title").and_then(Value::as_str)?;
                            Some(PriorityAction {
                                title: title.to_string(),
                                description: obj
                                    .get("description")
                                    .and_then(Value::as_str)
                                    .unwrap_or_default()
                                    .to_string(),
                            })
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    PriorityActions {
        immediate: bucket("immediate"),
        short_term: bucket("short_term"),
        long_term: bucket("long_term"),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_fixture() -> Value {
        json!({
            "summary": {
                "score": 82,
                "compliance_level": "AA",
                "overall_assessment": "Largely conformant."
            },
            "criteria_evaluation": [{
                "criterion_id": "1.1.1",
                "name": "Non-text Content",
                "status": "PASSED",
                "finding": "All images carry alt text.",
                "impact": "",
                "recommendation": "",
                "examples": [],
                "severity": "minor"
            }],
            "priority_actions": {
                "immediate": [{"title": "Fix hero image alt", "description": "d"}],
                "short_term": [],
                "long_term": []
            }
        })
    }

    #[test]
    fn parses_canonical_schema() {
        let result = parse_model_output(canonical_fixture()).unwrap();
        assert_eq!(result.summary.score, 82);
        assert_eq!(result.summary.compliance_level, ComplianceLevel::Aa);
        assert_eq!(result.criteria_evaluation.len(), 1);
        assert_eq!(result.passed_count(), 1);
        assert_eq!(result.violation_count(), 0);
        assert_eq!(
            result.priority_actions.unwrap().immediate[0].title,
            "Fix hero image alt"
        );
    }

    #[test]
    fn maps_legacy_german_schema() {
        let value = json!({
            "gesamtbewertung": {
                "score": 55,
                "compliance_level": "PARTIAL",
                "zusammenfassung": "Teilweise konform."
            },
            "detailbewertung": [{
                "criterion_id": "2.4.4",
                "status": "FAILED",
                "finding": "Linktexte nicht aussagekräftig."
            }],
            "priorisierte_massnahmen": {
                "immediate": ["Linktexte überarbeiten"]
            }
        });

        let result = parse_model_output(value).unwrap();
        assert_eq!(result.summary.score, 55);
        assert_eq!(result.summary.overall_assessment, "Teilweise konform.");
        assert_eq!(result.criteria_evaluation[0].status, CriterionStatus::Failed);
        let actions = result.priority_actions.unwrap();
        assert_eq!(actions.immediate[0].title, "Linktexte überarbeiten");
    }

    #[test]
    fn coerces_out_of_range_scores() {
        let mut value = canonical_fixture();
        value["summary"]["score"] = json!(140);
        assert_eq!(parse_model_output(value).unwrap().summary.score, 100);

        let mut value = canonical_fixture();
        value["summary"]["score"] = json!(-3);
        assert_eq!(parse_model_output(value).unwrap().summary.score, 0);
    }

    #[test]
    fn unknown_level_falls_back_to_score() {
        let mut value = canonical_fixture();
        value["summary"]["compliance_level"] = json!("GOLD");
        value["summary"]["score"] = json!(99);
        let result = parse_model_output(value).unwrap();
        assert_eq!(result.summary.compliance_level, ComplianceLevel::Aaa);
    }

    #[test]
    fn rejects_output_without_summary() {
        let err = parse_model_output(json!({"criteria_evaluation": []})).unwrap_err();
        assert_eq!(err.code(), "ParseFailed");
    }

    #[test]
    fn rejects_non_object_output() {
        assert!(parse_model_output(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn unknown_status_becomes_warning() {
        let mut value = canonical_fixture();
        value["criteria_evaluation"][0]["status"] = json!("MAYBE");
        let result = parse_model_output(value).unwrap();
        assert_eq!(
            result.criteria_evaluation[0].status,
            CriterionStatus::Warning
        );
    }

    #[test]
    fn level_from_score_thresholds() {
        assert_eq!(ComplianceLevel::from_score(100), ComplianceLevel::Aaa);
        assert_eq!(ComplianceLevel::from_score(85), ComplianceLevel::Aa);
        assert_eq!(ComplianceLevel::from_score(70), ComplianceLevel::A);
        assert_eq!(ComplianceLevel::from_score(50), ComplianceLevel::Partial);
        assert_eq!(ComplianceLevel::from_score(10), ComplianceLevel::None);
    }
}
