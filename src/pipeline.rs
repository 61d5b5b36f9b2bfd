//! End-to-end preparation sequence.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use crate::bootloader;
use crate::config::Config;
use crate::mount::{self, MountTable, RootMountStatus, PROC_MOUNTS};
use crate::privilege;
use crate::ramdisk;

/// Execute the full preparation sequence against the configured target root.
///
/// Fatal steps (root mount, fstab parse, ramdisk rebuild, bootloader
/// regeneration) abort the run. Individual secondary-mount failures are
/// aggregated into the report and must not keep the boot steps from
/// running: the tree that did come up is still worth configuring.
pub fn run_pipeline(config: &Config) -> Result<()> {
    println!("=== Guest Tree Preparation ===\n");
    let start = Instant::now();

    privilege::ensure_elevated()?;

    // 1. Resolve the device behind the live root and mount it at the target.
    println!("Mounting root filesystem...");
    let mounts_path = Path::new(PROC_MOUNTS);
    let root_source = MountTable::load(mounts_path)?
        .root_source()
        .context("resolving the root filesystem source")?;
    info!(source = root_source, "root source resolved");
    match mount::mount_root(&root_source, &config.target_root, mounts_path)
        .context("mounting the root filesystem")?
    {
        RootMountStatus::AlreadyMounted => println!(
            "  [SKIP] {} already mounted at {}",
            root_source,
            config.target_root.display()
        ),
        RootMountStatus::Mounted => println!(
            "  {} mounted at {}",
            root_source,
            config.target_root.display()
        ),
    }

    // 2. Plan and apply the guest's secondary mounts.
    println!("\nApplying secondary mounts...");
    let fstab = config.fstab_path();
    let plan = mount::parse_fstab(&fstab)
        .with_context(|| format!("planning mounts from {}", fstab.display()))?;
    info!(entries = plan.len(), fstab = %fstab.display(), "mount plan parsed");
    let report = mount::apply(&plan, &config.target_root, mounts_path);
    report.print();

    // 3. Rebuild the ramdisk against the now-complete tree.
    println!("\nRebuilding ramdisk image...");
    let outcome = ramdisk::rebuild(config).context("rebuilding the ramdisk image")?;
    println!(
        "  {} rebuilt for kernel {} via {}",
        outcome.image.display(),
        outcome.kernel_version,
        outcome.generator
    );
    println!("  Backup: {}", outcome.backup.display());

    // 4. Point the bootloader at the serial console and regenerate.
    println!("\nReconfiguring bootloader...");
    bootloader::reconfigure(config).context("reconfiguring the bootloader")?;
    println!("  Bootloader configuration regenerated");

    let total = start.elapsed().as_secs_f64();
    println!("\n=== Preparation Complete ({:.1}s) ===", total);
    println!("  Target tree: {}", config.target_root.display());
    if !report.all_ok() {
        println!(
            "  Note: {} secondary mount(s) failed - see the report above",
            report.failed().len()
        );
    }
    Ok(())
}
