//! The twelve WCAG 2.1 success-criterion groups ("axes") the engine evaluates.
//!
//! Each axis is one independently dispatched analysis module. The registry
//! here carries everything the orchestrator needs to iterate axes without
//! naming any of them: the stable key used as `module_name` in rows, a
//! human-readable title, and whether the group contains Level A criteria
//! (consulted by the reducer's conformance cap).

use serde::{Deserialize, Serialize};

/// Identifier of one WCAG success-criterion group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AxisKey {
    #[serde(rename = "1.1")]
    TextAlternatives,
    #[serde(rename = "1.2")]
    TimeBasedMedia,
    #[serde(rename = "1.3")]
    Adaptable,
    #[serde(rename = "1.4")]
    Distinguishable,
    #[serde(rename = "2.1")]
    KeyboardAccessible,
    #[serde(rename = "2.2")]
    EnoughTime,
    #[serde(rename = "2.3")]
    Seizures,
    #[serde(rename = "2.4")]
    Navigable,
    #[serde(rename = "3.1")]
    Readable,
    #[serde(rename = "3.2")]
    Predictable,
    #[serde(rename = "3.3")]
    InputAssistance,
    #[serde(rename = "4.1")]
    Compatible,
}

impl AxisKey {
    /// Registry order; also the dispatch order (completion order may differ).
    pub const ALL: [AxisKey; 12] = [
        Self::TextAlternatives,
        Self::TimeBasedMedia,
        Self::Adaptable,
        Self::Distinguishable,
        Self::KeyboardAccessible,
        Self::EnoughTime,
        Self::Seizures,
        Self::Navigable,
        Self::Readable,
        Self::Predictable,
        Self::InputAssistance,
        Self::Compatible,
    ];

    /// Stable key stored as `module_name` and used in report maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextAlternatives => "1.1",
            Self::TimeBasedMedia => "1.2",
            Self::Adaptable => "1.3",
            Self::Distinguishable => "1.4",
            Self::KeyboardAccessible => "2.1",
            Self::EnoughTime => "2.2",
            Self::Seizures => "2.3",
            Self::Navigable => "2.4",
            Self::Readable => "3.1",
            Self::Predictable => "3.2",
            Self::InputAssistance => "3.3",
            Self::Compatible => "4.1",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::TextAlternatives => "Text Alternatives",
            Self::TimeBasedMedia => "Time-based Media",
            Self::Adaptable => "Adaptable",
            Self::Distinguishable => "Distinguishable",
            Self::KeyboardAccessible => "Keyboard Accessible",
            Self::EnoughTime => "Enough Time",
            Self::Seizures => "Seizures and Physical Reactions",
            Self::Navigable => "Navigable",
            Self::Readable => "Readable",
            Self::Predictable => "Predictable",
            Self::InputAssistance => "Input Assistance",
            Self::Compatible => "Compatible",
        }
    }

    /// Whether the group contains Level A success criteria. In WCAG 2.1 all
    /// twelve groups do; the reducer consults the flag instead of assuming it.
    pub fn has_level_a_criteria(&self) -> bool {
        true
    }
}

impl std::str::FromStr for AxisKey {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for AxisKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
