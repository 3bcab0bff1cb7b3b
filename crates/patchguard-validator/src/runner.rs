//! Process-backed validator.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use patchguard_core::{
    ValidationCommand, ValidationOutcome, ValidationResult, Validator, ValidatorError,
};

use crate::markers::parse_sub_checks;

/// Prefix of the line appended to stderr when a validation is killed.
pub const TIMEOUT_MARKER: &str = "[patchguard] validation timed out after";

/// How long to wait for output pipes to close after the child exits.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs a [`ValidationCommand`] as a child process.
///
/// The exit code decides the outcome: `0` passes, any other code fails, and
/// a timeout or a kill by signal is an error. Output is captured in full and
/// scanned for per-test markers.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    parse_markers: bool,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self {
            parse_markers: true,
        }
    }
}

impl CommandValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip sub-check parsing (results carry an empty `sub_checks`).
    pub fn without_markers(mut self) -> Self {
        self.parse_markers = false;
        self
    }
}

#[async_trait]
impl Validator for CommandValidator {
    async fn run(
        &self,
        command: &ValidationCommand,
    ) -> Result<ValidationResult, ValidatorError> {
        if command.program.trim().is_empty() {
            return Err(ValidatorError::EmptyCommand);
        }

        info!(command = %command.display(), timeout_secs = command.timeout_secs, "running validation");
        let start = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ValidatorError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let waited = if command.timeout_secs == 0 {
            Some(child.wait().await?)
        } else {
            let limit = Duration::from_secs(command.timeout_secs);
            match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => Some(status?),
                Err(_) => {
                    warn!(command = %command.display(), "validation timed out; killing");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill timed-out validation");
                    }
                    None
                }
            }
        };

        let stdout = stdout.finish().await;
        let mut stderr = stderr.finish().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut result = match waited {
            Some(status) => ValidationResult::from_exit(status.code(), stdout, stderr, duration_ms),
            None => {
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&format!("{TIMEOUT_MARKER} {}s\n", command.timeout_secs));
                ValidationResult {
                    outcome: ValidationOutcome::Error,
                    exit_code: None,
                    stdout,
                    stderr,
                    sub_checks: Vec::new(),
                    duration_ms,
                    timed_out: true,
                }
            }
        };

        if self.parse_markers {
            let checks = parse_sub_checks(&format!("{}\n{}", result.stdout, result.stderr));
            result = result.with_sub_checks(checks);
        }

        debug!(
            outcome = %result.outcome,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            sub_checks = result.sub_checks.len(),
            "validation finished"
        );
        Ok(result)
    }
}

/// Background reader for one output pipe.
///
/// Bytes are appended to a shared buffer as they arrive, so whatever was
/// read before a kill is still available.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl Capture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buf, task }
    }

    /// Wait for the pipe to close, then decode what was read.
    ///
    /// A grandchild that inherited the pipe can keep it open after the child
    /// is gone; reading stops after [`DRAIN_GRACE`] in that case.
    async fn finish(mut self) -> String {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
        let bytes = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
