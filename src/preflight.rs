//! Preflight checks for the preparation pipeline.
//!
//! Validates privileges, host tools, and the target paths before anything
//! mutates. Run with `virtprep preflight` to check everything is ready.
//! Checks never modify the target tree; the only writes are probe files in
//! the log directory, removed immediately.

use std::fs;

use crate::config::Config;
use crate::mount::PROC_MOUNTS;
use crate::privilege;
use crate::process::find_tool;

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed - preparation will fail.
    Fail,
    /// Check passed but with a warning.
    Warn,
    /// Check skipped (not applicable).
    #[allow(dead_code)]
    Skip,
}

impl CheckResult {
    pub fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: None,
        }
    }

    pub fn pass_with(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: Some(details.to_string()),
        }
    }

    pub fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            details: Some(details.to_string()),
        }
    }

    pub fn warn(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            details: Some(details.to_string()),
        }
    }
}

/// Results of all preflight checks.
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Returns true if all checks passed (no failures).
    pub fn all_passed(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    /// Count of failed checks.
    pub fn fail_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .count()
    }

    /// Count of warnings.
    pub fn warn_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warn)
            .count()
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let icon = match check.status {
                CheckStatus::Pass => "✓",
                CheckStatus::Fail => "✗",
                CheckStatus::Warn => "⚠",
                CheckStatus::Skip => "○",
            };

            let status_str = match check.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Fail => "FAIL",
                CheckStatus::Warn => "WARN",
                CheckStatus::Skip => "SKIP",
            };

            print!("  {} [{}] {}", icon, status_str, check.name);
            if let Some(details) = &check.details {
                println!(": {}", details);
            } else {
                println!();
            }
        }

        println!();
        let total = self.checks.len();
        let passed = self
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Pass)
            .count();
        let failed = self.fail_count();
        let warned = self.warn_count();

        println!("Summary: {}/{} passed", passed, total);
        if failed > 0 {
            println!("         {} FAILED - preparation will not succeed", failed);
        }
        if warned > 0 {
            println!("         {} warnings", warned);
        }
    }
}

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    checks.push(check_privilege());
    checks.extend(check_host_tools());
    checks.extend(check_environment(config));

    PreflightReport { checks }
}

fn check_privilege() -> CheckResult {
    if privilege::is_elevated() {
        CheckResult::pass("effective uid 0")
    } else {
        CheckResult::fail(
            "effective uid 0",
            "Not running as root - mount, chroot and bootloader steps need it",
        )
    }
}

fn check_host_tools() -> Vec<CheckResult> {
    let mut results = Vec::new();

    let required_tools = [
        ("mount", "util-linux", "Required to assemble the target tree"),
        ("chroot", "coreutils", "Required to run the bootloader generator"),
        ("uname", "coreutils", "Required to detect the running kernel"),
    ];
    for (tool, package, purpose) in required_tools {
        results.push(check_tool_exists(tool, package, purpose, true));
    }

    // Any one generator is enough; dracut is the usual suspect.
    let generators = ["dracut", "mkinitrd", "update-initramfs"];
    match generators.iter().find_map(|g| find_tool(g).map(|p| (g, p))) {
        Some((name, path)) => {
            results.push(CheckResult::pass_with(
                "ramdisk generator",
                &format!("{} ({})", name, path.display()),
            ));
        }
        None => {
            results.push(CheckResult::warn(
                "ramdisk generator",
                "None of dracut/mkinitrd/update-initramfs found - `ramdisk` step will fail",
            ));
        }
    }

    results
}

fn check_environment(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    // An existing directory usually means a tree is already assembled
    // there, which is fine; an unreachable path is not.
    let target = &config.target_root;
    if target.is_dir() {
        results.push(CheckResult::pass_with(
            "target root",
            &target.display().to_string(),
        ));
    } else if target.exists() {
        results.push(CheckResult::fail(
            "target root",
            &format!("{} exists but is not a directory", target.display()),
        ));
    } else {
        match target.parent() {
            Some(parent) if parent.is_dir() => {
                results.push(CheckResult::pass_with(
                    "target root",
                    &format!("{} (will be created)", target.display()),
                ));
            }
            _ => {
                results.push(CheckResult::fail(
                    "target root",
                    &format!("{} and its parent are both absent", target.display()),
                ));
            }
        }
    }

    match fs::read_to_string(PROC_MOUNTS) {
        Ok(_) => results.push(CheckResult::pass("mount table readable")),
        Err(e) => results.push(CheckResult::fail(
            "mount table readable",
            &format!("Cannot read {}: {}", PROC_MOUNTS, e),
        )),
    }

    // A dead log sink degrades logging to stderr, so only warn.
    let log_dir = &config.log_dir;
    let probe = log_dir.join(".preflight-test");
    let writable = fs::create_dir_all(log_dir)
        .and_then(|_| fs::write(&probe, "test"))
        .map(|_| {
            let _ = fs::remove_file(&probe);
        });
    match writable {
        Ok(_) => results.push(CheckResult::pass_with(
            "log directory writable",
            &log_dir.display().to_string(),
        )),
        Err(e) => results.push(CheckResult::warn(
            "log directory writable",
            &format!("{} - audit log degrades to stderr: {}", log_dir.display(), e),
        )),
    }

    results
}

/// Check if a tool exists in PATH.
fn check_tool_exists(tool: &str, package: &str, purpose: &str, required: bool) -> CheckResult {
    match find_tool(tool) {
        Some(path) => CheckResult::pass_with(tool, &path.display().to_string()),
        None => {
            let msg = format!("Not found. Install '{}' package. {}", package, purpose);
            if required {
                CheckResult::fail(tool, &msg)
            } else {
                CheckResult::warn(tool, &msg)
            }
        }
    }
}
