//! Result artifact persistence.
//!
//! A finished [`PipelineResult`] is written to `<dir>/<run_id>/result.json`
//! with a companion `<dir>/<run_id>/result.digest` holding the SHA-256 digest
//! of the exact bytes written. Reading hashes the file as stored before
//! parsing it and rejects artifacts that were modified after writing.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::domain::error::{CurationError, Result};
use crate::pipeline::PipelineResult;

pub const RESULT_FILE: &str = "result.json";
pub const DIGEST_FILE: &str = "result.digest";

/// SHA-256 hex digest of serialized artifact bytes.
pub fn artifact_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `result` under `dir`, returning the path to `result.json`.
pub fn write_result_artifact(result: &PipelineResult, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(&result.run_id);
    std::fs::create_dir_all(&run_dir)?;

    let result_path = run_dir.join(RESULT_FILE);
    let digest_path = run_dir.join(DIGEST_FILE);

    let json = serde_json::to_vec_pretty(result)?;
    std::fs::write(&result_path, &json)?;
    std::fs::write(&digest_path, artifact_digest(&json).as_bytes())?;

    Ok(result_path)
}

/// Read and verify the artifact for `run_id` under `dir`.
pub fn read_result_artifact(run_id: &str, dir: &Path) -> Result<PipelineResult> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join(RESULT_FILE))?;
    let expected = std::fs::read_to_string(run_dir.join(DIGEST_FILE))?;
    let expected = expected.trim().to_string();

    let actual = artifact_digest(&json);
    if actual != expected {
        return Err(CurationError::DigestMismatch { expected, actual });
    }
    Ok(serde_json::from_slice(&json)?)
}
