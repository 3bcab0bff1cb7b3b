use serde::{Deserialize, Serialize};

use patchguard_memory::policy::keys;
use patchguard_memory::PolicySnapshot;

/// Thresholds for the consensus aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusPolicy {
    /// `high` findings at which an approval becomes conditional.
    pub max_high_findings: usize,
    /// Lowest acceptable quality score on a 0-10 scale.
    pub min_quality_score: f64,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            max_high_findings: 2,
            min_quality_score: 7.0,
        }
    }
}

impl ConsensusPolicy {
    pub fn from_policy(policy: &PolicySnapshot) -> Self {
        let defaults = Self::default();
        Self {
            max_high_findings: policy
                .get_u64(keys::MAX_HIGH_FINDINGS)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.max_high_findings),
            min_quality_score: policy
                .get_f64(keys::MIN_QUALITY_SCORE)
                .unwrap_or(defaults.min_quality_score),
        }
    }
}
