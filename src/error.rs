//! Error taxonomy for the preparation pipeline.
//!
//! Each variant is one failure class with its own process exit code, so
//! callers (and wrapper scripts) can branch on the kind of failure without
//! parsing log text. Variants carry the path and OS error text needed to
//! diagnose from the audit log alone.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure classes for the preparation pipeline.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Caller is not root; nothing was touched.
    #[error("must run as root (effective uid is not 0)")]
    Permission,

    /// A required device or source could not be determined.
    #[error("cannot resolve device: {detail}")]
    Resolution { detail: String },

    /// An expected input file or image is absent.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// A mount was attempted but failed or did not verify against the mount table.
    ///
    /// The identifier field stays `device`: thiserror infers a field named
    /// `source` as the error cause.
    #[error("mount {device} at {target} failed: {detail}")]
    Mount {
        device: String,
        target: PathBuf,
        detail: String,
    },

    /// A file copy, read, or write failed or could not be verified.
    #[error("io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The ramdisk generator reported failure.
    #[error("ramdisk rebuild failed: {detail}")]
    Rebuild { detail: String },

    /// The bootloader configuration generator reported failure.
    #[error("bootloader config generation failed: {detail}")]
    Generation { detail: String },
}

impl PrepError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn resolution(detail: impl Into<String>) -> Self {
        Self::Resolution {
            detail: detail.into(),
        }
    }

    pub fn mount(device: impl Into<String>, target: &Path, detail: impl Into<String>) -> Self {
        Self::Mount {
            device: device.into(),
            target: target.to_path_buf(),
            detail: detail.into(),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn rebuild(detail: impl Into<String>) -> Self {
        Self::Rebuild {
            detail: detail.into(),
        }
    }

    pub fn generation(detail: impl Into<String>) -> Self {
        Self::Generation {
            detail: detail.into(),
        }
    }

    /// Process exit code for this failure class.
    ///
    /// Codes are stable: wrapper tooling matches on them.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Permission => 10,
            Self::Resolution { .. } => 11,
            Self::NotFound { .. } => 12,
            Self::Mount { .. } => 13,
            Self::Io { .. } => 14,
            Self::Rebuild { .. } => 15,
            Self::Generation { .. } => 16,
        }
    }
}

/// Find the innermost `PrepError` in an anyhow chain, if any.
///
/// Command handlers wrap failures with `.context(..)`, which buries the
/// typed error below the contextual layers; the exit code must still come
/// from the class, not from the wrapper.
pub fn classify(err: &anyhow::Error) -> Option<&PrepError> {
    err.chain().find_map(|cause| cause.downcast_ref::<PrepError>())
}

/// Exit code for an anyhow error: the class code if one is present, 1 otherwise.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    classify(err).map(|e| e.exit_code()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinct() {
        let errors = [
            PrepError::Permission,
            PrepError::resolution("x"),
            PrepError::not_found("/x"),
            PrepError::mount("/dev/x", Path::new("/mnt"), "gone"),
            PrepError::io(Path::new("/x"), io::Error::other("boom")),
            PrepError::rebuild("x"),
            PrepError::generation("x"),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len(), "exit codes must be distinct");
        assert!(codes.iter().all(|c| *c != 0), "no class may alias success");
    }

    #[test]
    fn test_classify_through_context() {
        let err = anyhow::Error::from(PrepError::not_found("/etc/fstab"))
            .context("planning secondary mounts");

        let class = classify(&err).expect("typed error survives context layers");
        assert!(matches!(class, PrepError::NotFound { .. }));
        assert_eq!(exit_code_for(&err), 12);
    }

    #[test]
    fn test_exit_code_for_untyped() {
        let err = anyhow::anyhow!("plain failure");
        assert_eq!(exit_code_for(&err), 1);
    }

    #[test]
    fn test_display_includes_context() {
        let err = PrepError::mount("UUID=abc", Path::new("/mnt/vmroot/data"), "no entry");
        let msg = err.to_string();
        assert!(msg.contains("UUID=abc"));
        assert!(msg.contains("/mnt/vmroot/data"));
    }

    #[test]
    fn test_cause_chain_only_for_io() {
        use std::error::Error as _;

        // The mount identifier is plain data, not a nested error.
        let mount = PrepError::mount("UUID=abc", Path::new("/mnt/vmroot/data"), "no entry");
        assert!(mount.source().is_none());

        let io_err = PrepError::io(Path::new("/x"), io::Error::other("boom"));
        let cause = io_err.source().expect("io failures keep the OS error as cause");
        assert!(cause.to_string().contains("boom"));
    }
}
