//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `prepare` - Run the whole preparation pipeline
//! - `mounts` - Mount the root and apply the fstab plan
//! - `ramdisk` - Back up and rebuild the boot ramdisk
//! - `bootloader` - Reconfigure the bootloader for the serial console
//! - `preflight` - Run preflight checks
//! - `show` - Display information

mod bootloader;
mod mounts;
mod preflight;
mod prepare;
mod ramdisk;
mod show;

pub use bootloader::cmd_bootloader;
pub use mounts::cmd_mounts;
pub use preflight::cmd_preflight;
pub use prepare::cmd_prepare;
pub use ramdisk::cmd_ramdisk;
pub use show::{cmd_show, ShowTarget};
