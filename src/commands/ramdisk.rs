//! Ramdisk command - backs up and rebuilds the boot ramdisk.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::privilege;
use crate::ramdisk;

/// Execute the ramdisk command.
pub fn cmd_ramdisk(config: &Config, kernel_version: Option<String>) -> Result<()> {
    privilege::ensure_elevated()?;

    let mut config = config.clone();
    if kernel_version.is_some() {
        config.kernel_version = kernel_version;
    }

    let outcome = ramdisk::rebuild(&config).context("rebuilding the ramdisk image")?;
    println!(
        "Rebuilt {} for kernel {} via {}",
        outcome.image.display(),
        outcome.kernel_version,
        outcome.generator
    );
    println!("Backup retained at {}", outcome.backup.display());
    Ok(())
}
