//! Atomicity and commit-correctness of mutation transactions on disk.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use patchguard_core::fakes::ScriptedValidator;
use patchguard_core::{
    ArtifactKey, ArtifactStore, FsArtifactStore, MutationTransaction, SnapshotStore,
    ValidationCommand, ValidationOutcome, ValidationResult, Validator, ValidatorError,
};

fn key() -> ArtifactKey {
    ArtifactKey::new("app.py").unwrap()
}

fn fs_setup(
    validator: Arc<dyn Validator>,
) -> (tempfile::TempDir, Arc<FsArtifactStore>, MutationTransaction) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path().join("src")).unwrap());
    store.write(&key(), "def status():\n    return 500\n").unwrap();
    let snapshots =
        SnapshotStore::with_backup_dir(store.clone(), dir.path().join("backups")).unwrap();
    (dir, store, MutationTransaction::new(snapshots, validator))
}

#[tokio::test]
async fn rolled_back_artifact_is_byte_identical() {
    let (_dir, store, tx) = fs_setup(Arc::new(ScriptedValidator::always(ValidationOutcome::Fail)));
    let before = std::fs::read(store.path_of(&key())).unwrap();

    for candidate in ["return 404", "", "def status(:\n"] {
        let outcome = tx
            .execute(&key(), candidate, &ValidationCommand::new("pytest"))
            .await
            .unwrap();
        assert!(!outcome.committed);
        assert_eq!(std::fs::read(store.path_of(&key())).unwrap(), before);
    }
    assert!(tx.snapshots().pending().unwrap().is_empty());
}

#[tokio::test]
async fn committed_artifact_equals_candidate() {
    let (_dir, store, tx) = fs_setup(Arc::new(ScriptedValidator::always(ValidationOutcome::Pass)));
    let candidate = "def status():\n    return 200\n";
    let outcome = tx
        .execute(&key(), candidate, &ValidationCommand::new("pytest"))
        .await
        .unwrap();
    assert!(outcome.committed);
    assert_eq!(store.read(&key()).unwrap().content, candidate);
    assert_eq!(store.read(&key()).unwrap().digest, outcome.digest_after);
    assert!(tx.snapshots().pending().unwrap().is_empty());
}

/// Validator that records what it saw on disk, then fails.
struct ObservingValidator {
    store: Arc<FsArtifactStore>,
    seen: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl Validator for ObservingValidator {
    async fn run(&self, _command: &ValidationCommand) -> Result<ValidationResult, ValidatorError> {
        let content = self.store.read(&key()).unwrap().content;
        self.seen.lock().unwrap().push(content);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(ValidationResult::from_exit(Some(1), "", "AssertionError", 10))
    }
}

#[tokio::test]
async fn concurrent_transactions_on_one_artifact_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
    store.write(&key(), "original").unwrap();
    let validator = Arc::new(ObservingValidator {
        store: store.clone(),
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let tx = MutationTransaction::new(SnapshotStore::new(store.clone()), validator.clone());

    let a = {
        let tx = tx.clone();
        tokio::spawn(async move {
            tx.execute(&key(), "candidate-a", &ValidationCommand::new("t"))
                .await
                .unwrap()
        })
    };
    let b = {
        let tx = tx.clone();
        tokio::spawn(async move {
            tx.execute(&key(), "candidate-b", &ValidationCommand::new("t"))
                .await
                .unwrap()
        })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    // Each validation saw its own candidate, never the other's.
    let mut seen = validator.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["candidate-a".to_string(), "candidate-b".to_string()]);
    assert_eq!(a.digest_before, b.digest_before);
    assert_eq!(store.read(&key()).unwrap().content, "original");
}

#[tokio::test]
async fn aliased_keys_share_one_lock() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
    store.write(&key(), "original").unwrap();
    let validator = Arc::new(ObservingValidator {
        store: store.clone(),
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let tx = MutationTransaction::new(SnapshotStore::new(store.clone()), validator.clone());

    let plain = {
        let tx = tx.clone();
        tokio::spawn(async move {
            tx.execute(&key(), "candidate-a", &ValidationCommand::new("t"))
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(2)).await;
    let dotted = {
        let tx = tx.clone();
        tokio::spawn(async move {
            let alias = ArtifactKey::new("./app.py").unwrap();
            tx.execute(&alias, "candidate-b", &ValidationCommand::new("t"))
                .await
                .unwrap()
        })
    };
    let (a, b) = (plain.await.unwrap(), dotted.await.unwrap());

    assert!(!a.committed && !b.committed);
    assert_eq!(a.digest_before, b.digest_before);
    let mut seen = validator.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["candidate-a".to_string(), "candidate-b".to_string()]);
    assert_eq!(std::fs::read_to_string(store.path_of(&key())).unwrap(), "original");
}

#[tokio::test]
async fn snapshot_sidecar_survives_a_crash_and_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path().join("src")).unwrap());
    store.write(&key(), "original").unwrap();
    let backups = dir.path().join("backups");

    {
        let snapshots = SnapshotStore::with_backup_dir(store.clone(), &backups).unwrap();
        let _snap = snapshots.capture(&key(), uuid::Uuid::new_v4()).unwrap();
        store.write(&key(), "unvalidated candidate").unwrap();
        // Crash: neither restore nor discard runs.
    }

    let snapshots = SnapshotStore::with_backup_dir(store.clone(), &backups).unwrap();
    assert_eq!(snapshots.pending().unwrap().len(), 1);
    snapshots.recover_pending().unwrap();
    assert_eq!(store.read(&key()).unwrap().content, "original");
    assert!(snapshots.pending().unwrap().is_empty());
}
