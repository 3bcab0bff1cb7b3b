//! Candidate generator seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ArtifactKey;

use super::context::RepairContext;

/// Errors a generator may report instead of a candidate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    /// The generator has nothing to propose for this context.
    #[error("no candidate: {0}")]
    NoCandidate(String),

    #[error("generator failed: {0}")]
    Unrecoverable(String),
}

/// Everything a generator gets for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRequest {
    pub artifact_key: ArtifactKey,
    pub current_content: String,
    pub context: RepairContext,
    /// Consult external knowledge before proposing.
    pub escalate: bool,
    /// 1-based attempt index.
    pub attempt: u32,
}

/// Produces full replacement content for an artifact.
///
/// The repair loop treats the returned string opaquely.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn propose(&self, request: &CandidateRequest) -> Result<String, GeneratorError>;
}

#[async_trait]
impl<G: CandidateGenerator + ?Sized> CandidateGenerator for std::sync::Arc<G> {
    async fn propose(&self, request: &CandidateRequest) -> Result<String, GeneratorError> {
        (**self).propose(request).await
    }
}
