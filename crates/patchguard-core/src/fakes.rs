//! Scripted collaborators for tests.
//!
//! Provides `ScriptedValidator`, `ScriptedGenerator` and `StaticSource`,
//! which replay fixed behaviour without spawning processes or calling out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::consensus::SpecialistSource;
use crate::domain::{
    Artifact, SpecialistReport, SubCheck, ValidationCommand, ValidationOutcome, ValidationResult,
};
use crate::repair::{CandidateGenerator, CandidateRequest, GeneratorError};
use crate::validator::{Validator, ValidatorError};

pub use crate::store::MemoryArtifactStore;

/// Build a result for `outcome` with canned output.
pub fn result_for(outcome: ValidationOutcome) -> ValidationResult {
    match outcome {
        ValidationOutcome::Pass => ValidationResult::from_exit(Some(0), "1 passed", "", 5)
            .with_sub_checks(vec![SubCheck::passed("test_case")]),
        ValidationOutcome::Fail => ValidationResult::from_exit(
            Some(1),
            "FAILED tests/test_app.py::test_case - AssertionError: 500 != 200",
            "",
            5,
        )
        .with_sub_checks(vec![SubCheck::failed("tests/test_app.py::test_case")]),
        ValidationOutcome::Error => {
            let mut result = ValidationResult::from_exit(None, "", "killed", 5);
            result.timed_out = true;
            result
        }
    }
}

enum Script {
    Outcomes(Mutex<VecDeque<ValidationOutcome>>, ValidationOutcome),
    LaunchFailure,
}

/// Validator that replays a queue of outcomes, then repeats the fallback.
pub struct ScriptedValidator {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedValidator {
    pub fn always(outcome: ValidationOutcome) -> Self {
        Self::sequence([], outcome)
    }

    pub fn sequence(
        outcomes: impl IntoIterator<Item = ValidationOutcome>,
        then: ValidationOutcome,
    ) -> Self {
        Self {
            script: Script::Outcomes(Mutex::new(outcomes.into_iter().collect()), then),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every run fails to spawn.
    pub fn failing_to_launch() -> Self {
        Self {
            script: Script::LaunchFailure,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    async fn run(&self, command: &ValidationCommand) -> Result<ValidationResult, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::LaunchFailure => Err(ValidatorError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
            }),
            Script::Outcomes(queue, then) => {
                let next = queue
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .pop_front()
                    .unwrap_or(*then);
                Ok(result_for(next))
            }
        }
    }
}

/// Generator that replays candidates and records every request it saw.
pub struct ScriptedGenerator {
    candidates: Mutex<VecDeque<Result<String, GeneratorError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CandidateRequest>>,
}

impl ScriptedGenerator {
    /// Returns `candidates` in order, then `NoCandidate`.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: Mutex::new(candidates.into_iter().map(|c| Ok(c.into())).collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the same candidate forever.
    pub fn repeating(candidate: impl Into<String>) -> Self {
        Self {
            candidates: Mutex::new(VecDeque::new()),
            fallback: Some(candidate.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails on the first request.
    pub fn failing(error: GeneratorError) -> Self {
        Self {
            candidates: Mutex::new(VecDeque::from([Err(error)])),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CandidateRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CandidateGenerator for ScriptedGenerator {
    async fn propose(&self, request: &CandidateRequest) -> Result<String, GeneratorError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let next = self
            .candidates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match (next, &self.fallback) {
            (Some(candidate), _) => candidate,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(GeneratorError::NoCandidate("script exhausted".to_string())),
        }
    }
}

/// Specialist source returning a fixed report after an optional delay.
pub struct StaticSource {
    id: String,
    report: Option<SpecialistReport>,
    delay: Duration,
}

impl StaticSource {
    pub fn new(report: SpecialistReport) -> Self {
        Self {
            id: report.source.clone(),
            report: Some(report),
            delay: Duration::ZERO,
        }
    }

    /// A source whose analysis always errors.
    pub fn failing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            report: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SpecialistSource for StaticSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn analyze(&self, _artifact: &Artifact) -> anyhow::Result<SpecialistReport> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.report
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{} analysis failed", self.id))
    }
}
