//! Virtprep - offline guest preparation for hypervisor migration.
//!
//! Prepares a mounted guest tree so it boots under a new hypervisor:
//! - assembles the tree (root + fstab mounts) under the target root
//! - rebuilds the boot ramdisk, with a verified backup taken first
//! - points the bootloader at the serial console and regenerates its config
#![allow(dead_code, unused_imports)]

mod backup;
mod bootloader;
mod commands;
mod config;
mod error;
mod logging;
mod mount;
mod pipeline;
mod preflight;
mod privilege;
mod process;
mod ramdisk;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use config::Config;

#[derive(Parser)]
#[command(name = "virtprep")]
#[command(about = "Offline guest preparation for hypervisor migration")]
#[command(
    after_help = "QUICK START:\n  virtprep preflight    Check the environment\n  virtprep prepare      Mount, rebuild ramdisk, reconfigure bootloader\n  virtprep mounts       Assemble the target tree only\n  virtprep show config  Print the effective configuration"
)]
struct Cli {
    /// Target tree root (overrides VIRTPREP_TARGET_ROOT)
    #[arg(long, global = true)]
    target_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole preparation pipeline against the target tree
    Prepare,

    /// Mount the root filesystem and apply the guest's fstab plan
    Mounts {
        /// Print per-entry results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Back up and rebuild the boot ramdisk
    Ramdisk {
        /// Kernel version to rebuild for (default: running kernel)
        #[arg(long)]
        kernel_version: Option<String>,
    },

    /// Reconfigure the bootloader for the serial console
    Bootloader,

    /// Run preflight checks (verify the environment before preparing)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    let mut config = Config::load();
    if let Some(target_root) = cli.target_root {
        config.target_root = target_root;
    }

    // Held for the process lifetime so buffered log lines flush on exit.
    let _log_guard = logging::init(&config.log_dir);

    let result = match cli.command {
        Commands::Prepare => commands::cmd_prepare(&config),
        Commands::Mounts { json } => commands::cmd_mounts(&config, json),
        Commands::Ramdisk { kernel_version } => commands::cmd_ramdisk(&config, kernel_version),
        Commands::Bootloader => commands::cmd_bootloader(&config),
        Commands::Preflight { strict } => commands::cmd_preflight(&config, strict),
        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::ShowTarget::Config,
            };
            commands::cmd_show(show_target, &config)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(error::exit_code_for(&err) as u8)
        }
    }
}
