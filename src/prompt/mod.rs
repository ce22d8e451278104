//! Axis prompt templates and prompt assembly.
//!
//! The twelve templates are authored text files living in `prompts/` and
//! embedded at compile time; an operator can override any of them by pointing
//! `PROMPTS_DIR` at a directory with files of the same names. Each template
//! carries exactly one substitution point, `{WEBSITE_ANALYSIS_DATA}`, which
//! receives the serialized axis payload.

use std::collections::HashMap;
use std::path::Path;

use serde_json::json;
use serde_json::Value;

use crate::checker::AutomatedChecks;
use crate::domain::axes::AxisKey;
use crate::extractor::SiteSnapshot;

pub const DATA_PLACEHOLDER: &str = "{WEBSITE_ANALYSIS_DATA}";

/// Shared system preamble prepended to every module call.
pub const SYSTEM_PREAMBLE: &str = "You are a WCAG 2.1 conformance auditor. You respond with a \
single valid JSON object matching the requested schema. No markdown fences, no prose outside \
the JSON. Findings must cite only elements present in the supplied analysis data.";

const EMBEDDED: [(AxisKey, &str); 12] = [
    (AxisKey::TextAlternatives, include_str!("../../prompts/wcag_1_1.txt")),
    (AxisKey::TimeBasedMedia, include_str!("../../prompts/wcag_1_2.txt")),
    (AxisKey::Adaptable, include_str!("../../prompts/wcag_1_3.txt")),
    (AxisKey::Distinguishable, include_str!("../../prompts/wcag_1_4.txt")),
    (AxisKey::KeyboardAccessible, include_str!("../../prompts/wcag_2_1.txt")),
    (AxisKey::EnoughTime, include_str!("../../prompts/wcag_2_2.txt")),
    (AxisKey::Seizures, include_str!("../../prompts/wcag_2_3.txt")),
    (AxisKey::Navigable, include_str!("../../prompts/wcag_2_4.txt")),
    (AxisKey::Readable, include_str!("../../prompts/wcag_3_1.txt")),
    (AxisKey::Predictable, include_str!("../../prompts/wcag_3_2.txt")),
    (AxisKey::InputAssistance, include_str!("../../prompts/wcag_3_3.txt")),
    (AxisKey::Compatible, include_str!("../../prompts/wcag_4_1.txt")),
];

/// Immutable set of axis templates, resolved once at startup.
pub struct PromptLibrary {
    templates: HashMap<AxisKey, String>,
}

impl PromptLibrary {
    /// The compiled-in templates.
    pub fn embedded() -> Self {
        Self {
            templates: EMBEDDED
                .iter()
                .map(|(axis, text)| (*axis, text.to_string()))
                .collect(),
        }
    }

    /// Embedded templates with per-file overrides from a directory. A missing
    /// override file keeps the embedded text; an unreadable one is skipped
    /// with a warning.
    pub fn with_overrides(dir: &Path) -> Self {
        let mut library = Self::embedded();
        for (axis, _) in EMBEDDED.iter() {
            let file = dir.join(format!("wcag_{}.txt", axis.as_str().replace('.', "_")));
            match std::fs::read_to_string(&file) {
                Ok(text) => {
                    library.templates.insert(*axis, text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    log::warn!("Skipping unreadable template {}: {}", file.display(), e);
                }
            }
        }
        library
    }

    pub fn template(&self, axis: AxisKey) -> &str {
        self.templates
            .get(&axis)
            .map(String::as_str)
            .expect("every axis has a template")
    }

    /// Splice the axis payload into the template.
    pub fn assemble(&self, axis: AxisKey, payload: &Value) -> String {
        let data = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string());
        self.template(axis).replace(DATA_PLACEHOLDER, &data)
    }
}

/// Per-axis payload spliced into the placeholder: the axis slice plus the
/// automated-check context and site metadata.
pub fn module_payload(
    axis: AxisKey,
    site: &SiteSnapshot,
    checks: &AutomatedChecks,
) -> Value {
    json!({
        "axis": axis.as_str(),
        "axis_title": axis.title(),
        "site": {
            "root_url": &site.root_url,
            "page_count": site.pages.len(),
            "failed_pages": site.failed_pages,
            "robots_txt": site.context.robots_txt,
            "sitemap": site.context.sitemap,
            "ssl": site.context.ssl,
        },
        "pages": crate::extractor::slices::slice_for(axis, site),
        "automated_checks": checks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SiteContext;

    fn empty_site() -> SiteSnapshot {
        SiteSnapshot {
            root_url: "https://example.com/".into(),
            context: SiteContext::default(),
            pages: Vec::new(),
            failed_pages: 0,
        }
    }

    #[test]
    fn every_template_has_exactly_one_placeholder() {
        let library = PromptLibrary::embedded();
        for axis in AxisKey::ALL {
            let template = library.template(axis);
            assert_eq!(
                template.matches(DATA_PLACEHOLDER).count(),
                1,
                "axis {} template",
                axis
            );
        }
    }

    #[test]
    fn assemble_replaces_placeholder() {
        let library = PromptLibrary::embedded();
        let payload = module_payload(
            AxisKey::TextAlternatives,
            &empty_site(),
            &AutomatedChecks::default(),
        );
        let prompt = library.assemble(AxisKey::TextAlternatives, &payload);
        assert!(!prompt.contains(DATA_PLACEHOLDER));
        assert!(prompt.contains("https://example.com/"));
    }

    #[test]
    fn overrides_fall_back_to_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wcag_1_1.txt"), "custom {WEBSITE_ANALYSIS_DATA}").unwrap();

        let library = PromptLibrary::with_overrides(dir.path());
        assert!(library.template(AxisKey::TextAlternatives).starts_with("custom"));
        // Untouched axes keep the embedded text.
        assert!(library
            .template(AxisKey::Compatible)
            .contains("success criterion group 4.1"));
    }

    #[test]
    fn payload_names_the_axis() {
        let payload = module_payload(
            AxisKey::Navigable,
            &empty_site(),
            &AutomatedChecks::default(),
        );
        assert_eq!(payload["axis"], "2.4");
        assert_eq!(payload["site"]["page_count"], 0);
    }
}
