//! Bootloader command - reconfigures the target's bootloader.

use anyhow::{Context, Result};

use crate::bootloader;
use crate::config::Config;
use crate::privilege;

/// Execute the bootloader command.
pub fn cmd_bootloader(config: &Config) -> Result<()> {
    privilege::ensure_elevated()?;

    let state = bootloader::reconfigure(config).context("reconfiguring the bootloader")?;
    println!("Bootloader configuration regenerated (state: {state})");
    Ok(())
}
