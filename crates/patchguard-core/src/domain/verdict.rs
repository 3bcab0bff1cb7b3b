//! Consensus verdict over a set of specialist reports.

use serde::{Deserialize, Serialize};

use super::report::{Finding, Severity};

/// Final review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Conditional,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Conditional => "conditional",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding tagged with the source that reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFinding {
    pub source: String,
    #[serde(flatten)]
    pub finding: Finding,
}

impl ContributingFinding {
    /// `source [category] description`, as listed in a rationale.
    pub fn label(&self) -> String {
        format!(
            "{} [{}] {}",
            self.source, self.finding.category, self.finding.description
        )
    }
}

/// Finding counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Merged outcome of a review.
///
/// Carries no timestamp: the same reports and policy always produce an equal
/// verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateVerdict {
    pub decision: Decision,
    /// Findings that drove the decision: criticals when any exist, highs
    /// when the high limit was reached. Report order, then finding order.
    pub contributing: Vec<ContributingFinding>,
    /// Every finding from every report, in the same order.
    #[serde(default)]
    pub findings: Vec<ContributingFinding>,
    pub rationale: String,
    pub severity_counts: SeverityCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowest_quality_score: Option<f64>,
}

impl AggregateVerdict {
    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &ContributingFinding> {
        self.findings
            .iter()
            .filter(move |c| c.finding.severity == severity)
    }
}
