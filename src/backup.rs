//! Verified backups of files about to be mutated.
//!
//! Nothing in the pipeline rewrites a boot image or bootloader file until
//! a `.bak` copy exists and its SHA256 digest matches the original. The
//! digest re-read is the verification: a copy that "succeeded" but cannot
//! be read back identical aborts the mutation. Backups are overwritten on
//! repeat runs (single most recent) and never pruned.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::PrepError;

/// Suffix appended to the original file name.
pub const BACKUP_SUFFIX: &str = "bak";

/// Backup location for a file: `<path>.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Compute the SHA256 digest of a file's content.
pub fn file_digest(path: &Path) -> Result<String, PrepError> {
    let content = fs::read(path).map_err(|e| PrepError::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy `path` to `<path>.bak` and verify the copy byte-for-byte.
///
/// Returns the backup path. The caller must not mutate `path` unless this
/// returned `Ok`.
pub fn backup_file(path: &Path) -> Result<PathBuf, PrepError> {
    if !path.is_file() {
        return Err(PrepError::not_found(path));
    }

    let dest = backup_path(path);
    let original_digest = file_digest(path)?;

    fs::copy(path, &dest).map_err(|e| PrepError::io(path, e))?;

    let copy_digest = file_digest(&dest)?;
    if copy_digest != original_digest {
        return Err(PrepError::io(
            &dest,
            std::io::Error::other("backup digest does not match original"),
        ));
    }

    info!(
        original = %path.display(),
        backup = %dest.display(),
        "backup written and verified"
    );
    Ok(dest)
}
