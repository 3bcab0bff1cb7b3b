//! The repair loop driven by a real test command over files on disk.
#![cfg(unix)]

use std::fs;
use std::sync::Arc;

use patchguard_core::fakes::ScriptedGenerator;
use patchguard_core::{
    ArtifactKey, FailureClass, FsArtifactStore, MemoryStore, MutationTransaction, RepairLoop,
    SessionStatus, SnapshotStore, ValidationCommand, ValidationOutcome, Validator,
};
use patchguard_validator::{CommandValidator, SuiteConfig};

const BROKEN: &str = "def status():\n    return 500\n";
const FIXED: &str = "def status():\n    return 200\n";

struct Workspace {
    dir: tempfile::TempDir,
    memory: Arc<MemoryStore>,
    repair: RepairLoop,
}

fn key() -> ArtifactKey {
    ArtifactKey::new("app.py").unwrap()
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("app.py"), BROKEN).unwrap();

    let store = Arc::new(FsArtifactStore::new(&src).unwrap());
    let snapshots = SnapshotStore::with_backup_dir(store, dir.path().join("snapshots")).unwrap();
    let memory = Arc::new(MemoryStore::open(dir.path().join("memory")).unwrap());
    let tx = MutationTransaction::new(snapshots, Arc::new(CommandValidator::new()));
    let repair = RepairLoop::new(tx, memory.clone());
    Workspace {
        dir,
        memory,
        repair,
    }
}

/// Passes only when the artifact returns 200.
fn status_check(ws: &Workspace) -> ValidationCommand {
    let script = "if grep -q 'return 200' app.py; then echo 'ok 1 - status'; \
                  else echo 'not ok 1 - status'; echo 'AssertionError: 500 != 200' >&2; exit 1; fi";
    ValidationCommand::new("sh")
        .args(["-c", script])
        .in_dir(ws.dir.path().join("src"))
        .with_timeout(30)
}

fn artifact(ws: &Workspace) -> String {
    fs::read_to_string(ws.dir.path().join("src/app.py")).unwrap()
}

#[tokio::test]
async fn repair_commits_the_first_passing_candidate() {
    let ws = workspace();
    let generator = ScriptedGenerator::new([BROKEN.replace("500", "404"), FIXED.to_string()]);

    let session = ws
        .repair
        .debug_until_fixed(&key(), &status_check(&ws), &generator, Some(5))
        .await;

    assert_eq!(session.status, SessionStatus::Succeeded);
    assert_eq!(session.attempts.len(), 2);
    assert_eq!(session.winning_attempt().map(|a| a.sequence), Some(2));
    assert_eq!(artifact(&ws), FIXED);

    let first = &session.attempts[0];
    assert_eq!(first.result.outcome, ValidationOutcome::Fail);
    assert_eq!(first.failure_class, Some(FailureClass::Assertion));
    assert_eq!(first.result.failing_checks().count(), 1);

    assert!(session.learning_recorded);
    assert_eq!(ws.memory.len().unwrap(), 1);
    assert!(ws.repair.transaction().snapshots().pending().unwrap().is_empty());
}

#[tokio::test]
async fn exhausted_session_leaves_file_byte_identical() {
    let ws = workspace();
    let generator = ScriptedGenerator::repeating("def status():\n    return 418\n");

    let session = ws
        .repair
        .debug_until_fixed(&key(), &status_check(&ws), &generator, Some(3))
        .await;

    assert_eq!(session.status, SessionStatus::Exhausted);
    assert_eq!(session.attempts.len(), 3);
    assert_eq!(artifact(&ws), BROKEN);
    assert!(!session.learning_recorded);
    assert!(ws.memory.is_empty().unwrap());
}

#[tokio::test]
async fn timed_out_candidate_is_rolled_back() {
    let ws = workspace();
    let generator = ScriptedGenerator::new([FIXED]);
    let command = ValidationCommand::new("sleep").arg("5").with_timeout(1);

    let session = ws
        .repair
        .debug_until_fixed(&key(), &command, &generator, Some(1))
        .await;

    assert_eq!(session.status, SessionStatus::Exhausted);
    let attempt = &session.attempts[0];
    assert!(attempt.result.timed_out);
    assert_eq!(attempt.failure_class, Some(FailureClass::Timeout));
    assert_eq!(artifact(&ws), BROKEN);
}

#[tokio::test]
async fn suite_config_runs_through_the_validator() {
    let dir = tempfile::tempdir().unwrap();
    let command = SuiteConfig::custom(
        "smoke",
        vec!["sh".to_string(), "-c".to_string(), "echo 'test smoke::run ... ok'".to_string()],
        10,
    )
    .in_dir(dir.path())
    .to_command()
    .unwrap();

    let result = CommandValidator::new().run(&command).await.unwrap();
    assert!(result.passed());
    assert_eq!(result.sub_checks.len(), 1);
    assert!(result.sub_checks[0].passed);
}
