//! Specialist fan-out / fan-in.
//!
//! Every source analyses the same artifact independently. Sources run as
//! separate tasks, bounded by a semaphore, each under its own timeout. A
//! source that errors, panics or times out contributes an empty report and
//! never blocks the others.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use patchguard_memory::policy::keys;
use patchguard_memory::PolicySnapshot;

use crate::domain::{AggregateVerdict, Artifact, SpecialistReport};

use super::aggregate::aggregate;
use super::policy::ConsensusPolicy;

/// An independent analysis of one artifact.
#[async_trait]
pub trait SpecialistSource: Send + Sync {
    /// Stable identifier used as the report source.
    fn id(&self) -> &str;

    async fn analyze(&self, artifact: &Artifact) -> anyhow::Result<SpecialistReport>;
}

/// Fan-out limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutConfig {
    /// Sources analysing at the same time.
    pub max_concurrent: usize,
    /// Per-source timeout in seconds.
    pub source_timeout_secs: u64,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            source_timeout_secs: 60,
        }
    }
}

impl FanOutConfig {
    pub fn from_policy(policy: &PolicySnapshot) -> Self {
        let defaults = Self::default();
        Self {
            source_timeout_secs: policy
                .get_u64(keys::SPECIALIST_TIMEOUT_SECS)
                .unwrap_or(defaults.source_timeout_secs),
            ..defaults
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

/// Joined result of a fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct FanIn {
    /// One report per source, in source order.
    pub reports: Vec<SpecialistReport>,
    pub timed_out: Vec<String>,
    pub failed: Vec<String>,
}

impl FanIn {
    pub fn is_complete(&self) -> bool {
        self.timed_out.is_empty() && self.failed.is_empty()
    }
}

enum SourceResult {
    Report(SpecialistReport),
    TimedOut,
    Failed,
}

/// Run every source against `artifact` and wait for all of them.
#[instrument(skip_all, fields(key = %artifact.key, sources = sources.len()))]
pub async fn gather_reports(
    sources: &[Arc<dyn SpecialistSource>],
    artifact: &Artifact,
    config: &FanOutConfig,
) -> FanIn {
    let sem = Arc::new(tokio::sync::Semaphore::new(config.max_concurrent.max(1)));
    let artifact = Arc::new(artifact.clone());
    let timeout = config.source_timeout();

    let tasks: Vec<_> = sources
        .iter()
        .map(|source| {
            let source = Arc::clone(source);
            let artifact = Arc::clone(&artifact);
            let sem = Arc::clone(&sem);
            tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                match tokio::time::timeout(timeout, source.analyze(&artifact)).await {
                    Ok(Ok(report)) => SourceResult::Report(report),
                    Ok(Err(e)) => {
                        warn!(source = source.id(), error = %e, "specialist analysis failed");
                        SourceResult::Failed
                    }
                    Err(_) => {
                        warn!(source = source.id(), timeout_secs = timeout.as_secs(), "specialist timed out");
                        SourceResult::TimedOut
                    }
                }
            })
        })
        .collect();

    let joined = futures::future::join_all(tasks).await;

    let mut fan_in = FanIn {
        reports: Vec::with_capacity(sources.len()),
        timed_out: Vec::new(),
        failed: Vec::new(),
    };
    for (source, joined) in sources.iter().zip(joined) {
        let id = source.id().to_string();
        match joined {
            Ok(SourceResult::Report(mut report)) => {
                report.source = id;
                fan_in.reports.push(report);
            }
            Ok(SourceResult::TimedOut) => {
                fan_in.reports.push(SpecialistReport::empty(id.clone()));
                fan_in.timed_out.push(id);
            }
            Ok(SourceResult::Failed) => {
                fan_in.reports.push(SpecialistReport::empty(id.clone()));
                fan_in.failed.push(id);
            }
            Err(e) => {
                warn!(source = %id, error = %e, "specialist task panicked");
                fan_in.reports.push(SpecialistReport::empty(id.clone()));
                fan_in.failed.push(id);
            }
        }
    }
    fan_in
}

/// Gather every report, then aggregate once.
pub async fn review(
    sources: &[Arc<dyn SpecialistSource>],
    artifact: &Artifact,
    policy: &ConsensusPolicy,
    config: &FanOutConfig,
) -> (AggregateVerdict, FanIn) {
    let fan_in = gather_reports(sources, artifact, config).await;
    let verdict = aggregate(&fan_in.reports, policy);
    (verdict, fan_in)
}
