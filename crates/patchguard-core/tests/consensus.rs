//! Aggregation rules, monotonicity and fan-out behaviour.

use std::sync::Arc;
use std::time::Duration;

use patchguard_core::fakes::StaticSource;
use patchguard_core::{
    aggregate, gather_reports, policy_keys, review, Artifact, ArtifactKey, ConsensusPolicy,
    Decision, FanOutConfig, Finding, PolicySnapshot, Severity, SpecialistReport,
    SpecialistSource,
};

fn report(source: &str, severities: &[Severity]) -> SpecialistReport {
    severities
        .iter()
        .enumerate()
        .fold(SpecialistReport::new(source), |r, (i, s)| {
            r.with_finding(Finding::new(*s, "general", format!("{source} finding {i}")))
        })
}

fn artifact() -> Artifact {
    Artifact::new(ArtifactKey::new("app.py").unwrap(), "return 200")
}

#[test]
fn medium_and_two_highs_at_threshold_two_is_conditional() {
    let reports = vec![report(
        "security",
        &[Severity::Medium, Severity::High, Severity::High],
    )];
    let verdict = aggregate(&reports, &ConsensusPolicy::default());
    assert_eq!(verdict.decision, Decision::Conditional);
    // The medium finding drove nothing.
    assert_eq!(verdict.contributing.len(), 2);
    assert!(verdict
        .contributing
        .iter()
        .all(|c| c.finding.severity == Severity::High));
    assert_eq!(verdict.severity_counts.high, 2);
    assert!(verdict.rationale.contains("security [general] security finding 1"));
    assert!(verdict.rationale.contains("security [general] security finding 2"));
    assert!(!verdict.rationale.contains("security finding 0"));
}

#[test]
fn any_critical_rejects_and_lists_it() {
    let reports = vec![
        report("quality", &[Severity::Low]),
        report("security", &[Severity::Critical]),
    ];
    let verdict = aggregate(&reports, &ConsensusPolicy::default());
    assert_eq!(verdict.decision, Decision::Reject);
    assert_eq!(verdict.contributing.len(), 1);
    assert_eq!(verdict.contributing[0].source, "security");
    assert_eq!(verdict.contributing[0].finding.severity, Severity::Critical);
    assert!(verdict.rationale.contains("security [general] security finding 0"));
    assert!(!verdict.rationale.contains("quality finding 0"));
    assert_eq!(verdict.findings.len(), 2);
}

#[test]
fn low_quality_score_is_conditional() {
    let reports = vec![
        report("security", &[]),
        SpecialistReport::new("quality").with_quality_score(6.5),
    ];
    let verdict = aggregate(&reports, &ConsensusPolicy::default());
    assert_eq!(verdict.decision, Decision::Conditional);
    assert!(verdict.rationale.contains("6.5"));
}

#[test]
fn policy_thresholds_come_from_the_policy_snapshot() {
    let snap = PolicySnapshot::new()
        .with(policy_keys::MAX_HIGH_FINDINGS, 3)
        .with(policy_keys::MIN_QUALITY_SCORE, 5.0);
    let policy = ConsensusPolicy::from_policy(&snap);
    let reports = vec![
        report("security", &[Severity::High, Severity::High]),
        SpecialistReport::new("quality").with_quality_score(6.5),
    ];
    assert_eq!(aggregate(&reports, &policy).decision, Decision::Approve);
}

#[test]
fn contributing_findings_follow_report_then_finding_order() {
    let reports = vec![
        report("a", &[Severity::Low, Severity::High]),
        report("b", &[Severity::High, Severity::Medium, Severity::High]),
    ];
    let verdict = aggregate(&reports, &ConsensusPolicy::default());
    let order: Vec<String> = verdict
        .contributing
        .iter()
        .map(|c| c.finding.description.clone())
        .collect();
    assert_eq!(order, vec!["a finding 1", "b finding 0", "b finding 2"]);

    let all: Vec<String> = verdict
        .findings
        .iter()
        .map(|c| c.finding.description.clone())
        .collect();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0], "a finding 0");
}

fn rank(d: Decision) -> u8 {
    match d {
        Decision::Approve => 0,
        Decision::Conditional => 1,
        Decision::Reject => 2,
    }
}

#[test]
fn adding_findings_never_improves_the_decision() {
    let policy = ConsensusPolicy::default();
    let all = [
        Severity::Low,
        Severity::High,
        Severity::Medium,
        Severity::High,
        Severity::Low,
        Severity::Critical,
    ];
    let mut previous = Decision::Approve;
    for n in 0..=all.len() {
        let verdict = aggregate(&[report("s", &all[..n])], &policy);
        assert!(
            rank(verdict.decision) >= rank(previous),
            "{:?} after {:?} at n={n}",
            verdict.decision,
            previous
        );
        previous = verdict.decision;
    }
    assert_eq!(previous, Decision::Reject);
}

#[test]
fn decision_is_independent_of_report_order_and_idempotent() {
    let policy = ConsensusPolicy::default();
    let a = report("a", &[Severity::High]);
    let b = report("b", &[Severity::High, Severity::Low]).with_quality_score(8.0);
    let c = SpecialistReport::new("c").with_quality_score(7.5);

    let forward = aggregate(&[a.clone(), b.clone(), c.clone()], &policy);
    let reverse = aggregate(&[c.clone(), b.clone(), a.clone()], &policy);
    assert_eq!(forward.decision, reverse.decision);
    assert_eq!(forward.severity_counts, reverse.severity_counts);
    assert_eq!(forward.lowest_quality_score, reverse.lowest_quality_score);

    let again = aggregate(&[a, b, c], &policy);
    assert_eq!(forward, again);
}

#[tokio::test(start_paused = true)]
async fn slow_source_is_treated_as_empty() {
    let sources: Vec<Arc<dyn SpecialistSource>> = vec![
        Arc::new(StaticSource::new(report("security", &[Severity::High]))),
        Arc::new(
            StaticSource::new(report("quality", &[Severity::Critical]))
                .with_delay(Duration::from_secs(600)),
        ),
        Arc::new(StaticSource::failing("coverage")),
    ];
    let config = FanOutConfig {
        source_timeout_secs: 5,
        ..FanOutConfig::default()
    };

    let fan_in = gather_reports(&sources, &artifact(), &config).await;

    let ids: Vec<&str> = fan_in.reports.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(ids, vec!["security", "quality", "coverage"]);
    assert_eq!(fan_in.timed_out, vec!["quality".to_string()]);
    assert_eq!(fan_in.failed, vec!["coverage".to_string()]);
    assert!(fan_in.reports[1].findings.is_empty());
    assert!(!fan_in.is_complete());
}

#[tokio::test]
async fn review_aggregates_after_full_fan_in() {
    let sources: Vec<Arc<dyn SpecialistSource>> = vec![
        Arc::new(StaticSource::new(report("security", &[Severity::High]))),
        Arc::new(StaticSource::new(report("quality", &[Severity::High]))),
        Arc::new(StaticSource::new(report("tests", &[Severity::Medium]))),
    ];
    let config = FanOutConfig {
        max_concurrent: 1,
        ..FanOutConfig::default()
    };

    let (verdict, fan_in) = review(&sources, &artifact(), &ConsensusPolicy::default(), &config).await;

    assert!(fan_in.is_complete());
    assert_eq!(verdict.decision, Decision::Conditional);
    assert_eq!(verdict.contributing.len(), 2);
    assert_eq!(verdict.contributing[0].source, "security");
    assert_eq!(verdict.contributing[1].source, "quality");
    assert_eq!(verdict.findings.len(), 3);
}

#[test]
fn fan_out_config_reads_specialist_timeout() {
    let snap = PolicySnapshot::new().with(policy_keys::SPECIALIST_TIMEOUT_SECS, 15);
    let config = FanOutConfig::from_policy(&snap);
    assert_eq!(config.source_timeout(), Duration::from_secs(15));
    assert_eq!(config.max_concurrent, 4);
}
