//! Apply a mount plan entry by entry.
//!
//! Each entry is handled independently: one failing filesystem must not
//! keep the rest of the image from coming up, so failures are recorded in
//! the report and the loop moves on. Every applied mount is verified
//! against a fresh read of the mount table before it counts as done.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::PrepError;
use crate::mount::fstab::MountEntry;
use crate::mount::table::MountTable;
use crate::process::Cmd;

/// What happened to a single plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MountOutcome {
    /// A matching mount was already in place; nothing was done.
    AlreadyMounted,
    /// The mount was applied and verified against the mount table.
    Mounted,
    /// The mount could not be applied or did not verify.
    Failed,
}

/// Per-entry result with the failure detail when there is one.
#[derive(Debug, Clone, Serialize)]
pub struct MountResult {
    #[serde(flatten)]
    pub entry: MountEntry,
    pub outcome: MountOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Results of applying a whole plan.
#[derive(Debug, Clone)]
pub struct MountReport {
    pub results: Vec<MountResult>,
}

impl MountReport {
    pub fn all_ok(&self) -> bool {
        !self
            .results
            .iter()
            .any(|r| r.outcome == MountOutcome::Failed)
    }

    pub fn failed(&self) -> Vec<&MountResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == MountOutcome::Failed)
            .collect()
    }

    pub fn mounted_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == MountOutcome::Mounted)
            .count()
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== Mount Plan Results ===\n");

        for result in &self.results {
            let icon = match result.outcome {
                MountOutcome::AlreadyMounted => "○",
                MountOutcome::Mounted => "✓",
                MountOutcome::Failed => "✗",
            };

            let status_str = match result.outcome {
                MountOutcome::AlreadyMounted => "KEPT",
                MountOutcome::Mounted => "MOUNTED",
                MountOutcome::Failed => "FAILED",
            };

            print!(
                "  {} [{}] {} -> {}",
                icon, status_str, result.entry.source, result.entry.target
            );
            if let Some(detail) = &result.detail {
                println!(": {}", detail);
            } else {
                println!();
            }
        }

        println!();
        let total = self.results.len();
        let failed = self.failed().len();
        println!(
            "Summary: {}/{} in place ({} newly mounted)",
            total - failed,
            total,
            self.mounted_count()
        );
        if failed > 0 {
            println!("         {} FAILED", failed);
        }
    }

    /// Machine-readable form: the per-entry results as a JSON array.
    pub fn to_json(&self) -> Result<String, PrepError> {
        serde_json::to_string_pretty(&self.results)
            .map_err(|e| PrepError::resolution(format!("cannot serialize mount report: {e}")))
    }
}

/// Apply every entry of `plan` under `target_root`.
///
/// Entries whose exact source+target pair is already mounted are kept
/// as-is. Entries targeting the root itself never reach a mount call; the
/// occupied mountpoint reports them as already in place.
pub fn apply(plan: &[MountEntry], target_root: &Path, mounts_path: &Path) -> MountReport {
    let mut results = Vec::with_capacity(plan.len());

    for entry in plan {
        let full_target = entry.full_target(target_root);
        // Fresh snapshot per entry; earlier iterations change the table.
        let outcome = match MountTable::load(mounts_path) {
            Ok(table) if table.is_mounted(&entry.source, &full_target) => {
                info!(
                    source = entry.source,
                    target = %full_target.display(),
                    "already mounted, skipping"
                );
                (MountOutcome::AlreadyMounted, None)
            }
            Ok(_) => apply_one(entry, &full_target, mounts_path),
            Err(e) => (MountOutcome::Failed, Some(e.to_string())),
        };

        if let (MountOutcome::Failed, Some(detail)) = (&outcome.0, &outcome.1) {
            warn!(
                source = entry.source,
                target = %full_target.display(),
                detail,
                "mount failed, continuing with remaining entries"
            );
        }
        results.push(MountResult {
            entry: entry.clone(),
            outcome: outcome.0,
            detail: outcome.1,
        });
    }

    MountReport { results }
}

fn apply_one(
    entry: &MountEntry,
    full_target: &Path,
    mounts_path: &Path,
) -> (MountOutcome, Option<String>) {
    if let Err(e) = fs::create_dir_all(full_target) {
        return (
            MountOutcome::Failed,
            Some(format!("cannot create mountpoint: {e}")),
        );
    }

    let mut cmd = Cmd::new("mount").arg("-t").arg(&entry.fstype);
    let options = entry.options_string();
    if !options.is_empty() {
        cmd = cmd.arg("-o").arg(&options);
    }
    let result = match cmd.arg(&entry.source).arg_path(full_target).allow_fail().run() {
        Ok(r) => r,
        Err(e) => return (MountOutcome::Failed, Some(e.to_string())),
    };

    // Verify against the table; the exit status is advisory only.
    match MountTable::load(mounts_path) {
        Ok(table) if table.is_mounted(&entry.source, full_target) => {
            info!(
                source = entry.source,
                target = %full_target.display(),
                fstype = entry.fstype,
                "mounted and verified"
            );
            (MountOutcome::Mounted, None)
        }
        Ok(_) => {
            let detail = if result.success() {
                "mount exited 0 but no matching mount-table record appeared".to_string()
            } else {
                result.stderr_trimmed().to_string()
            };
            (MountOutcome::Failed, Some(detail))
        }
        Err(e) => (MountOutcome::Failed, Some(e.to_string())),
    }
}
