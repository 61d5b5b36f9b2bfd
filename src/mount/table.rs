//! Live mount-table queries and the verified root mount.
//!
//! The kernel's mount table is the single source of truth here: a mount is
//! considered applied only when a matching record shows up in it, never
//! because the mount command exited zero. The table path is a parameter so
//! tests can substitute fixture files for `/proc/self/mounts`.

use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::PrepError;
use crate::process::Cmd;

/// Mount table of the running process.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

/// One record from a mounts file.
#[derive(Debug, Clone)]
pub struct MountRecord {
    pub source: String,
    pub target: PathBuf,
    pub fstype: String,
    pub options: String,
}

/// Snapshot of a mounts file.
#[derive(Debug, Clone)]
pub struct MountTable {
    records: Vec<MountRecord>,
}

/// Outcome of [`mount_root`]: whether the mount call was needed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootMountStatus {
    AlreadyMounted,
    Mounted,
}

impl MountTable {
    /// Load and parse a mounts file.
    pub fn load(path: &Path) -> Result<Self, PrepError> {
        let content = fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Parse mounts-file content (`source target fstype options ...` per line).
    pub fn parse(content: &str) -> Self {
        let mut records = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(source), Some(target), Some(fstype)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            records.push(MountRecord {
                source: unescape_octal(source),
                target: PathBuf::from(unescape_octal(target)),
                fstype: fstype.to_string(),
                options: fields.next().unwrap_or("").to_string(),
            });
        }
        Self { records }
    }

    pub fn records(&self) -> &[MountRecord] {
        &self.records
    }

    /// Source device of the filesystem mounted at `/`.
    ///
    /// Later mounts shadow earlier ones, so the table is scanned back to
    /// front. Pseudo-sources without a path (`overlay`, `rootfs` and
    /// friends) are skipped.
    pub fn root_source(&self) -> Result<String, PrepError> {
        for rec in self.records.iter().rev() {
            if rec.target == Path::new("/") && rec.source.starts_with('/') {
                return Ok(rec.source.clone());
            }
        }
        Err(PrepError::resolution(
            "no device-backed filesystem is mounted at /",
        ))
    }

    /// True if any filesystem is mounted exactly at `target`.
    pub fn target_mounted(&self, target: &Path) -> bool {
        let target = normalize_target(target);
        self.records
            .iter()
            .any(|rec| normalize_target(&rec.target) == target)
    }

    /// True only if `source` is mounted exactly at `target`.
    ///
    /// Sources are compared by block-device identity, so `UUID=`/`LABEL=`
    /// spellings match the kernel-named device in the table. Sources with
    /// no device identity (bind directories, tmpfs and friends) fall back
    /// to the strongest check available: the exact target being occupied.
    pub fn is_mounted(&self, source: &str, target: &Path) -> bool {
        let target = normalize_target(target);
        let Some(device) = resolve_device(source) else {
            return self
                .records
                .iter()
                .any(|rec| normalize_target(&rec.target) == target);
        };
        self.records.iter().any(|rec| {
            normalize_target(&rec.target) == target
                && resolve_device(&rec.source).is_some_and(|d| d == device)
        })
    }
}

/// Mount `source` at `target` and verify against a re-read of the table.
///
/// Creates `target` if absent. If the pair is already present the mount
/// command is not invoked at all. A mount call that exits zero without a
/// matching record appearing afterwards is a failure.
pub fn mount_root(
    source: &str,
    target: &Path,
    mounts_path: &Path,
) -> Result<RootMountStatus, PrepError> {
    let table = MountTable::load(mounts_path)?;
    if table.is_mounted(source, target) {
        info!(source, target = %target.display(), "root filesystem already mounted");
        return Ok(RootMountStatus::AlreadyMounted);
    }

    fs::create_dir_all(target).map_err(|e| PrepError::io(target, e))?;

    let result = Cmd::new("mount")
        .arg(source)
        .arg_path(target)
        .allow_fail()
        .run()
        .map_err(|e| PrepError::mount(source, target, e.to_string()))?;

    // Exit status alone is not trusted; the table decides.
    let table = MountTable::load(mounts_path)?;
    if !table.is_mounted(source, target) {
        let detail = if result.success() {
            "mount exited 0 but no matching mount-table record appeared".to_string()
        } else {
            result.stderr_trimmed().to_string()
        };
        return Err(PrepError::mount(source, target, detail));
    }

    if !result.success() {
        warn!(
            source,
            target = %target.display(),
            code = result.code(),
            "mount reported failure but the table shows the mount in place"
        );
    }
    info!(source, target = %target.display(), "root filesystem mounted and verified");
    Ok(RootMountStatus::Mounted)
}

/// Resolve a descriptor source to the block device backing it, if any.
///
/// `UUID=`/`LABEL=`/`PARTUUID=` go through the /dev/disk symlink farms;
/// plain paths are canonicalized. Only block devices qualify.
fn resolve_device(source: &str) -> Option<PathBuf> {
    let path = if let Some(uuid) = source.strip_prefix("UUID=") {
        PathBuf::from("/dev/disk/by-uuid").join(uuid)
    } else if let Some(label) = source.strip_prefix("LABEL=") {
        PathBuf::from("/dev/disk/by-label").join(label)
    } else if let Some(partuuid) = source.strip_prefix("PARTUUID=") {
        PathBuf::from("/dev/disk/by-partuuid").join(partuuid)
    } else if source.starts_with('/') {
        PathBuf::from(source)
    } else {
        return None;
    };

    let resolved = fs::canonicalize(&path).ok()?;
    let meta = fs::metadata(&resolved).ok()?;
    meta.file_type().is_block_device().then_some(resolved)
}

/// Targets compare canonicalized when they exist, literal otherwise.
fn normalize_target(target: &Path) -> PathBuf {
    fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf())
}

/// Decode the octal escapes (`\040` for space etc.) used by mounts files.
pub(crate) fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal(&bytes[i + 1..i + 4]) {
            let value = (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal(bytes: &[u8]) -> bool {
    // First digit capped at 3 so the decoded value fits a byte.
    (b'0'..=b'3').contains(&bytes[0]) && bytes[1..].iter().all(|b| (b'0'..=b'7').contains(b))
}
