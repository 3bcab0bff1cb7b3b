//! Report aggregation rules.
//!
//! Rules, first match wins:
//! 1. any `critical` finding rejects;
//! 2. `high` findings reaching `max_high_findings`, or a lowest quality score
//!    below `min_quality_score`, make the verdict conditional;
//! 3. otherwise approve.
//!
//! The decision depends only on counts and the minimum score, so it does not
//! change with report order.

use crate::domain::{
    AggregateVerdict, ContributingFinding, Decision, Severity, SeverityCounts, SpecialistReport,
};
use crate::metrics::METRICS;
use crate::obs;

use super::policy::ConsensusPolicy;

/// Merge `reports` into one verdict.
pub fn aggregate(reports: &[SpecialistReport], policy: &ConsensusPolicy) -> AggregateVerdict {
    let mut counts = SeverityCounts::default();
    let mut findings = Vec::new();
    for report in reports {
        for finding in &report.findings {
            counts.record(finding.severity);
            findings.push(ContributingFinding {
                source: report.source.clone(),
                finding: finding.clone(),
            });
        }
    }

    let lowest_quality_score = reports
        .iter()
        .filter_map(|r| r.quality_score)
        .filter(|s| !s.is_nan())
        .reduce(f64::min);

    let reject = counts.critical > 0;
    let high_limit = counts.high >= policy.max_high_findings && counts.high > 0;
    let low_quality = lowest_quality_score.is_some_and(|s| s < policy.min_quality_score);

    let contributing: Vec<ContributingFinding> = findings
        .iter()
        .filter(|c| match c.finding.severity {
            Severity::Critical => reject,
            Severity::High => high_limit,
            Severity::Medium | Severity::Low => false,
        })
        .cloned()
        .collect();

    let mut crossed = Vec::new();
    if reject {
        crossed.push(format!(
            "{} critical finding(s): {}",
            counts.critical,
            labels(&contributing, Severity::Critical)
        ));
    }
    if high_limit {
        crossed.push(format!(
            "{} high finding(s) reach the limit of {}: {}",
            counts.high,
            policy.max_high_findings,
            labels(&contributing, Severity::High)
        ));
    }
    if let Some(score) = lowest_quality_score.filter(|_| low_quality) {
        crossed.push(format!(
            "lowest quality score {score:.1} is below the minimum of {:.1}",
            policy.min_quality_score
        ));
    }

    let decision = if reject {
        Decision::Reject
    } else if high_limit || low_quality {
        Decision::Conditional
    } else {
        Decision::Approve
    };

    let rationale = if crossed.is_empty() {
        format!(
            "approved: no blocking findings ({} high, {} medium, {} low)",
            counts.high, counts.medium, counts.low
        )
    } else {
        format!("{decision}: {}", crossed.join("; "))
    };

    METRICS.inc_verdicts();
    obs::emit_verdict_evaluated(decision, reports.len(), counts.total());

    AggregateVerdict {
        decision,
        contributing,
        findings,
        rationale,
        severity_counts: counts,
        lowest_quality_score,
    }
}

fn labels(contributing: &[ContributingFinding], severity: Severity) -> String {
    contributing
        .iter()
        .filter(|c| c.finding.severity == severity)
        .map(ContributingFinding::label)
        .collect::<Vec<_>>()
        .join(", ")
}
