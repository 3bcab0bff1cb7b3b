//! Validation command and result types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Timeout applied when a command does not set one.
pub const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 60;

/// An external test invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCommand {
    /// Executable to launch.
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory; the caller's current directory when `None`.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Timeout in seconds. `0` disables the timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_VALIDATION_TIMEOUT_SECS
}

impl ValidationCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout_secs: DEFAULT_VALIDATION_TIMEOUT_SECS,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Overall validation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Pass,
    Fail,
    /// The command could not reach a verdict (timeout, killed by a signal).
    Error,
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One named check recognised in the validator output (e.g. a test case).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCheck {
    pub name: String,
    pub passed: bool,
}

impl SubCheck {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
        }
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
        }
    }
}

/// Result of one validator invocation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub outcome: ValidationOutcome,

    /// Exit code; `None` when the process was killed or never exited.
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    /// Best-effort parse of per-test markers; empty when none were recognised.
    #[serde(default)]
    pub sub_checks: Vec<SubCheck>,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    #[serde(default)]
    pub timed_out: bool,
}

impl ValidationResult {
    /// Build a result from process output, deriving the outcome from the exit code.
    pub fn from_exit(
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let outcome = match exit_code {
            Some(0) => ValidationOutcome::Pass,
            Some(_) => ValidationOutcome::Fail,
            None => ValidationOutcome::Error,
        };
        Self {
            outcome,
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            sub_checks: Vec::new(),
            duration_ms,
            timed_out: false,
        }
    }

    pub fn with_sub_checks(mut self, sub_checks: Vec<SubCheck>) -> Self {
        self.sub_checks = sub_checks;
        self
    }

    pub fn passed(&self) -> bool {
        self.outcome == ValidationOutcome::Pass
    }

    pub fn failing_checks(&self) -> impl Iterator<Item = &SubCheck> {
        self.sub_checks.iter().filter(|c| !c.passed)
    }

    /// stdout followed by stderr.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}
