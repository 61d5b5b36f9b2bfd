//! Parse the target filesystem's fstab into a mount plan.
//!
//! The plan covers secondary filesystems only: the root line is skipped by
//! the executor (its target is already occupied once the root mount is in
//! place) and swap lines carry no mountpoint, so they are dropped here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::error::PrepError;
use crate::mount::table::unescape_octal;

/// One mountable fstab line.
#[derive(Debug, Clone, Serialize)]
pub struct MountEntry {
    pub source: String,
    /// Mountpoint as written in fstab, relative to the guest's own root.
    pub target: String,
    pub fstype: String,
    pub options: Vec<String>,
}

impl MountEntry {
    /// Where this entry lands on the host, under the mounted target root.
    pub fn full_target(&self, target_root: &Path) -> PathBuf {
        target_root.join(self.target.trim_start_matches('/'))
    }

    pub fn options_string(&self) -> String {
        self.options.join(",")
    }
}

/// Read and parse an fstab file. A missing file is a hard error: a guest
/// image without an fstab cannot be planned.
pub fn parse_fstab(path: &Path) -> Result<Vec<MountEntry>, PrepError> {
    if !path.is_file() {
        return Err(PrepError::not_found(path));
    }
    let content = fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
    Ok(parse_entries(&content))
}

/// Parse fstab content into mountable entries.
///
/// Comment and blank lines are skipped. Swap entries are dropped. A line
/// with fewer than three fields is logged and skipped rather than failing
/// the whole plan.
pub fn parse_entries(content: &str) -> Vec<MountEntry> {
    let mut entries = Vec::new();
    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(source), Some(target), Some(fstype)) =
            (fields.next(), fields.next(), fields.next())
        else {
            warn!(line = lineno + 1, "skipping malformed fstab line: {raw}");
            continue;
        };
        if fstype == "swap" || target == "none" || target == "swap" {
            continue;
        }
        let options = fields
            .next()
            .unwrap_or("defaults")
            .split(',')
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        entries.push(MountEntry {
            source: unescape_octal(source),
            target: unescape_octal(target),
            fstype: fstype.to_string(),
            options,
        });
    }
    entries
}
