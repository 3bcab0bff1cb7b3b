//! Builtin validation suites and their configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use patchguard_core::{ValidationCommand, ValidatorError};

/// Test runners PatchGuard knows how to invoke.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinSuite {
    /// python -m pytest -v
    Pytest,

    /// cargo test --workspace
    CargoTest,
}

impl BuiltinSuite {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinSuite::Pytest => "pytest",
            BuiltinSuite::CargoTest => "cargo_test",
        }
    }

    /// Program and arguments, program first.
    pub fn command(&self) -> Vec<String> {
        let parts: &[&str] = match self {
            // -v prints one PASSED/FAILED marker per test.
            BuiltinSuite::Pytest => &["python", "-m", "pytest", "-v"],
            BuiltinSuite::CargoTest => &["cargo", "test", "--workspace"],
        };
        parts.iter().map(|s| s.to_string()).collect()
    }
}

/// A named, reusable validation setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Extra arguments appended after `command`, e.g. a test path.
    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    pub timeout_secs: u64,
}

impl SuiteConfig {
    pub fn from_builtin(suite: BuiltinSuite, timeout_secs: u64) -> Self {
        Self {
            name: suite.name().to_string(),
            command: suite.command(),
            targets: Vec::new(),
            working_dir: None,
            timeout_secs,
        }
    }

    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            targets: Vec::new(),
            working_dir: None,
            timeout_secs,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Build the command the validator runs.
    pub fn to_command(&self) -> Result<ValidationCommand, ValidatorError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(ValidatorError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(ValidatorError::EmptyCommand);
        }

        let mut cmd = ValidationCommand::new(program.clone())
            .args(args.iter().cloned())
            .args(self.targets.iter().cloned())
            .with_timeout(self.timeout_secs);
        if let Some(dir) = &self.working_dir {
            cmd = cmd.in_dir(dir.clone());
        }
        Ok(cmd)
    }
}
