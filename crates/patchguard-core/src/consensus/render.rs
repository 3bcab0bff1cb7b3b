//! Markdown audit report for a verdict.

use std::fmt::Write;

use crate::domain::{AggregateVerdict, Decision, Severity};

/// Render `verdict` as a Markdown audit report.
///
/// Sections run from most to least severe; empty sections are omitted.
pub fn render_verdict_md(verdict: &AggregateVerdict) -> String {
    let mut md = String::new();
    let counts = &verdict.severity_counts;

    let _ = writeln!(md, "# Code Audit Report\n");
    let _ = writeln!(md, "## Summary\n");
    let _ = writeln!(md, "| Severity | Count |");
    let _ = writeln!(md, "|---|---|");
    for severity in Severity::DESCENDING {
        let _ = writeln!(md, "| {severity} | {} |", counts.get(severity));
    }
    if let Some(score) = verdict.lowest_quality_score {
        let _ = writeln!(md, "\nLowest quality score: {score:.1}/10");
    }
    md.push('\n');

    for severity in Severity::DESCENDING {
        let mut findings = verdict.findings_with(severity).peekable();
        if findings.peek().is_none() {
            continue;
        }
        let _ = writeln!(md, "## {} findings\n", title(severity));
        for c in findings {
            let _ = writeln!(
                md,
                "- **{}** [{}] {}",
                c.source, c.finding.category, c.finding.description
            );
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Recommendation\n");
    let _ = writeln!(md, "**{}**: {}", label(verdict.decision), verdict.rationale);
    md
}

fn title(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical",
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
    }
}

fn label(decision: Decision) -> &'static str {
    match decision {
        Decision::Approve => "APPROVE",
        Decision::Conditional => "CONDITIONAL",
        Decision::Reject => "REJECT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{aggregate, ConsensusPolicy};
    use crate::domain::{Finding, SpecialistReport};

    #[test]
    fn renders_sections_and_recommendation() {
        let reports = vec![
            SpecialistReport::new("security")
                .with_finding(Finding::new(Severity::Critical, "injection", "raw SQL in login")),
            SpecialistReport::new("quality")
                .with_finding(Finding::new(Severity::Low, "style", "long function"))
                .with_quality_score(6.2),
        ];
        let verdict = aggregate(&reports, &ConsensusPolicy::default());
        let md = render_verdict_md(&verdict);

        assert!(md.contains("| critical | 1 |"));
        assert!(md.contains("## Critical findings"));
        assert!(md.contains("- **security** [injection] raw SQL in login"));
        assert!(md.contains("## Low findings"));
        assert!(!md.contains("## High findings"));
        assert!(md.contains("Lowest quality score: 6.2/10"));
        assert!(md.contains("**REJECT**"));
    }
}
