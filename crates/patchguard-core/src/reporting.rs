//! Digest-verified audit artifacts for sessions and verdicts.
//!
//! Layout: `<dir>/<id>/session.json` + `session.digest`, and
//! `<dir>/<id>/verdict.json` + `verdict.digest`. The digest is the SHA-256
//! of the JSON bytes; reads fail with [`PatchError::DigestMismatch`] when
//! they disagree.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use patchguard_memory::ContentDigest;

use crate::domain::{AggregateVerdict, PatchError, RepairSession, Result};

/// Persist `<dir>/<session.id>/session.json` and its digest.
pub fn write_session_artifact(session: &RepairSession, dir: &Path) -> Result<PathBuf> {
    write_artifact(session, &dir.join(session.id.to_string()), "session")
}

pub fn read_session_artifact(session_id: &str, dir: &Path) -> Result<RepairSession> {
    read_artifact(&dir.join(session_id), "session")
}

/// Persist `<dir>/<review_id>/verdict.json` and its digest.
pub fn write_verdict_artifact(
    verdict: &AggregateVerdict,
    review_id: &str,
    dir: &Path,
) -> Result<PathBuf> {
    write_artifact(verdict, &dir.join(review_id), "verdict")
}

pub fn read_verdict_artifact(review_id: &str, dir: &Path) -> Result<AggregateVerdict> {
    read_artifact(&dir.join(review_id), "verdict")
}

fn write_artifact<T: Serialize>(value: &T, run_dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(run_dir)?;

    let artifact_path = run_dir.join(format!("{name}.json"));
    let digest_path = run_dir.join(format!("{name}.digest"));
    let json = serde_json::to_vec_pretty(value)?;
    let digest = ContentDigest::from_bytes(&json);

    // JSON first: a digest without its JSON never verifies.
    persist(run_dir, &artifact_path, &json)?;
    persist(run_dir, &digest_path, digest.as_str().as_bytes())?;

    Ok(artifact_path)
}

fn read_artifact<T: DeserializeOwned>(run_dir: &Path, name: &str) -> Result<T> {
    let json = fs::read(run_dir.join(format!("{name}.json")))?;
    let expected = fs::read_to_string(run_dir.join(format!("{name}.digest")))?;
    let actual = ContentDigest::from_bytes(&json);
    if expected.trim() != actual.as_str() {
        return Err(PatchError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

fn persist(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| PatchError::FsIo(e.error))?;
    Ok(())
}
