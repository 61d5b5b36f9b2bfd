//! Mounts command - mounts the root and applies the fstab plan.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::mount::{self, MountTable, RootMountStatus, PROC_MOUNTS};
use crate::privilege;

/// Execute the mounts command.
///
/// Per-entry failures are printed and logged but do not fail the command;
/// callers that need to branch on them consume the `--json` output.
pub fn cmd_mounts(config: &Config, json: bool) -> Result<()> {
    privilege::ensure_elevated()?;

    let mounts_path = Path::new(PROC_MOUNTS);
    let root_source = MountTable::load(mounts_path)?
        .root_source()
        .context("resolving the root filesystem source")?;
    let status = mount::mount_root(&root_source, &config.target_root, mounts_path)
        .context("mounting the root filesystem")?;
    if !json {
        match status {
            RootMountStatus::AlreadyMounted => println!(
                "[SKIP] {} already mounted at {}",
                root_source,
                config.target_root.display()
            ),
            RootMountStatus::Mounted => println!(
                "{} mounted at {}",
                root_source,
                config.target_root.display()
            ),
        }
    }

    let fstab = config.fstab_path();
    let plan = mount::parse_fstab(&fstab)
        .with_context(|| format!("planning mounts from {}", fstab.display()))?;
    let report = mount::apply(&plan, &config.target_root, mounts_path);

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!();
        report.print();
    }
    Ok(())
}
