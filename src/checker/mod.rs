//! Rule-based accessibility checks that need no model call.
//!
//! Cheap, deterministic rules over the site snapshot. The output rides along
//! with every module payload as additional context and gives the reducer a
//! safety floor independent of model judgment.

use serde::Serialize;

use crate::extractor::{PageStructure, SiteSnapshot};

/// Severity of an automated finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingLevel {
    Violation,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleFinding {
    pub rule: &'static str,
    pub message: String,
    pub pages: Vec<String>,
    pub count: usize,
}

/// Aggregated automated-check output for one site.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutomatedChecks {
    pub violations: Vec<RuleFinding>,
    pub warnings: Vec<RuleFinding>,
    pub passes: Vec<&'static str>,
}

impl AutomatedChecks {
    pub fn violation_count(&self) -> usize {
        self.violations.iter().map(|f| f.count).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.iter().map(|f| f.count).sum()
    }
}

pub struct AutomatedChecker;

/// One rule: returns pages where it fires plus the occurrence count.
type Rule = (
    &'static str,
    &'static str,
    FindingLevel,
    fn(&PageStructure) -> usize,
);

const RULES: [Rule; 6] = [
    (
        "html-lang-missing",
        "Document is missing a lang attribute on <html>",
        FindingLevel::Violation,
        |p| usize::from(p.lang.as_deref().map_or(true, |l| l.is_empty())),
    ),
    (
        "duplicate-ids",
        "Duplicate id attributes break ARIA references and label bindings",
        FindingLevel::Violation,
        |p| p.duplicate_ids.len(),
    ),
    (
        "img-empty-src",
        "Image with an empty src attribute",
        FindingLevel::Violation,
        |p| {
            p.images
                .iter()
                .filter(|i| matches!(i.kind, crate::extractor::page_extractor::ImageKind::Img))
                .filter(|i| i.src.is_empty())
                .count()
        },
    ),
    (
        "img-alt-missing",
        "Image without alt attribute and without ARIA labelling",
        FindingLevel::Violation,
        |p| {
            p.images
                .iter()
                .filter(|i| matches!(i.kind, crate::extractor::page_extractor::ImageKind::Img))
                .filter(|i| !i.is_decorative && i.alt.is_none() && i.aria_label.is_none())
                .count()
        },
    ),
    (
        "form-field-unlabelled",
        "Form control without an associated label",
        FindingLevel::Violation,
        |p| {
            p.forms
                .iter()
                .flat_map(|f| &f.fields)
                .filter(|f| !f.is_labelled())
                .count()
        },
    ),
    (
        "heading-skip",
        "Heading hierarchy skips one or more levels",
        FindingLevel::Warning,
        heading_skips,
    ),
];

fn heading_skips(page: &PageStructure) -> usize {
    let mut skips = 0;
    let mut last_level: Option<i64> = None;
    for heading in &page.headings {
        if let Some(last) = last_level {
            if heading.level > last + 1 {
                skips += 1;
            }
        } else if heading.level > 1 {
            skips += 1;
        }
        last_level = Some(heading.level);
    }
    skips
}

impl AutomatedChecker {
    pub fn run(site: &SiteSnapshot) -> AutomatedChecks {
        let mut checks = AutomatedChecks::default();

        for (rule, message, level, check) in RULES {
            let mut pages = Vec::new();
            let mut count = 0;
            for page in &site.pages {
                let hits = check(page);
                if hits > 0 {
                    pages.push(page.url.clone());
                    count += hits;
                }
            }

            if count == 0 {
                checks.passes.push(rule);
                continue;
            }

            let finding = RuleFinding {
                rule,
                message: message.to_string(),
                pages,
                count,
            };
            match level {
                FindingLevel::Violation => checks.violations.push(finding),
                FindingLevel::Warning => checks.warnings.push(finding),
            }
        }

        log::debug!(
            "Automated checks: {} violations, {} warnings, {} passes",
            checks.violation_count(),
            checks.warning_count(),
            checks.passes.len()
        );

        checks
    }
}
