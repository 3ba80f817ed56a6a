//! Report format enumeration.
//!
//! The set of document kinds is fixed at compile time. Declaration order is the
//! canonical order used everywhere a set of formats is iterated (batch fan-out,
//! export sections, API listings).

use serde::{Deserialize, Serialize};

/// One kind of output document generated from the incident notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    ExecutiveSummary,
    TechnicalPostmortem,
    VisualTimeline,
    RootCauseAnalysis,
    ImpactAssessment,
    Resolution,
    ActionItems,
    ExecutiveCommunication,
}

impl ReportFormat {
    /// All formats in canonical order.
    pub fn all() -> &'static [ReportFormat] {
        &[
            Self::ExecutiveSummary,
            Self::TechnicalPostmortem,
            Self::VisualTimeline,
            Self::RootCauseAnalysis,
            Self::ImpactAssessment,
            Self::Resolution,
            Self::ActionItems,
            Self::ExecutiveCommunication,
        ]
    }

    /// Wire identifier sent to the generation backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "executive_summary",
            Self::TechnicalPostmortem => "technical_postmortem",
            Self::VisualTimeline => "visual_timeline",
            Self::RootCauseAnalysis => "root_cause_analysis",
            Self::ImpactAssessment => "impact_assessment",
            Self::Resolution => "resolution",
            Self::ActionItems => "action_items",
            Self::ExecutiveCommunication => "executive_communication",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.as_str() == s)
    }

    /// Section title used in exports and listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "Executive Summary",
            Self::TechnicalPostmortem => "Technical Post-Mortem",
            Self::VisualTimeline => "Visual Timeline",
            Self::RootCauseAnalysis => "Root Cause Analysis",
            Self::ImpactAssessment => "Impact Assessment",
            Self::Resolution => "Resolution",
            Self::ActionItems => "Action Items",
            Self::ExecutiveCommunication => "Executive Email",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "1-page overview for leadership",
            Self::TechnicalPostmortem => "Detailed analysis with timeline",
            Self::VisualTimeline => "ASCII art timeline",
            Self::RootCauseAnalysis => "Why it happened and why it was not caught",
            Self::ImpactAssessment => "Technical and business impact",
            Self::Resolution => "Actions taken and verification",
            Self::ActionItems => "Organized task tracker",
            Self::ExecutiveCommunication => "Email-ready communication",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_formats_round_trip_through_identifier() {
        for format in ReportFormat::all() {
            assert_eq!(ReportFormat::from_str(format.as_str()), Some(*format));
        }
    }

    #[test]
    fn unknown_identifier_rejected() {
        assert_eq!(ReportFormat::from_str("haiku"), None);
        assert_eq!(ReportFormat::from_str(""), None);
        assert_eq!(ReportFormat::from_str("Executive_Summary"), None);
    }

    #[test]
    fn canonical_order_matches_ord() {
        let mut sorted = ReportFormat::all().to_vec();
        sorted.sort();
        assert_eq!(sorted, ReportFormat::all());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ReportFormat::RootCauseAnalysis).unwrap();
        assert_eq!(json, "\"root_cause_analysis\"");
        let parsed: ReportFormat = serde_json::from_str("\"action_items\"").unwrap();
        assert_eq!(parsed, ReportFormat::ActionItems);
    }

    #[test]
    fn serde_and_wire_identifiers_agree() {
        for format in ReportFormat::all() {
            let json = serde_json::to_string(format).unwrap();
            assert_eq!(json.trim_matches('"'), format.as_str());
        }
    }

    #[test]
    fn labels_are_distinct() {
        let mut labels: Vec<_> = ReportFormat::all().iter().map(|f| f.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), ReportFormat::all().len());
    }

    #[test]
    fn display_uses_identifier() {
        assert_eq!(ReportFormat::VisualTimeline.to_string(), "visual_timeline");
    }
}
