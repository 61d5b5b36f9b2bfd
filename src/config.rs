//! Configuration management for virtprep.
//!
//! Reads configuration from .env file and environment variables.
//! Environment variables take precedence over .env file; CLI flags
//! (applied by the caller) take precedence over both. The loaded value is
//! passed explicitly into every component so tests can run against
//! multiple target trees without path collisions.

use std::path::{Path, PathBuf};

/// Default path under which the guest tree is assembled.
pub const DEFAULT_TARGET_ROOT: &str = "/mnt/vmroot";

/// Default directory for the append-only audit log.
pub const DEFAULT_LOG_DIR: &str = "/var/log/virtprep";

/// Serial console parameters written into the guest's kernel command line.
///
/// These are fixed for a run (set for the destination hypervisor), never
/// discovered from the guest.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Serial console device (e.g. "ttyS0").
    pub device: String,
    /// Console baud rate.
    pub baud: u32,
    /// Early-console device for pre-driver boot output.
    pub earlycon: String,
    /// Bootloader menu delay in seconds.
    pub boot_delay_secs: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            device: "ttyS0".to_string(),
            baud: 115_200,
            earlycon: "ttyS0".to_string(),
            boot_delay_secs: 3,
        }
    }
}

/// Virtprep configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute path under which the guest root and secondary filesystems
    /// are mounted.
    pub target_root: PathBuf,
    /// Override for the guest's filesystem-table descriptor
    /// (default: `<target_root>/etc/fstab`).
    pub fstab_override: Option<PathBuf>,
    /// Kernel version whose ramdisk is rebuilt (default: running kernel).
    pub kernel_version: Option<String>,
    /// Directory for the audit log file.
    pub log_dir: PathBuf,
    /// Console parameters for the bootloader command line.
    pub console: ConsoleConfig,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `.env` loading (dotenvy) happens once in `main` before this runs.
    pub fn load() -> Self {
        let target_root = env_path("VIRTPREP_TARGET_ROOT")
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_ROOT));

        let fstab_override = env_path("VIRTPREP_FSTAB");

        let kernel_version = std::env::var("VIRTPREP_KERNEL_VERSION")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let log_dir =
            env_path("VIRTPREP_LOG_DIR").unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        let defaults = ConsoleConfig::default();
        let console = ConsoleConfig {
            device: std::env::var("VIRTPREP_CONSOLE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.device),
            baud: env_u32("VIRTPREP_BAUD").unwrap_or(defaults.baud),
            earlycon: std::env::var("VIRTPREP_EARLYCON")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.earlycon),
            boot_delay_secs: env_u32("VIRTPREP_BOOT_DELAY").unwrap_or(defaults.boot_delay_secs),
        };

        Self {
            target_root,
            fstab_override,
            kernel_version,
            log_dir,
            console,
        }
    }

    /// The filesystem-table descriptor this run plans from.
    pub fn fstab_path(&self) -> PathBuf {
        self.fstab_override
            .clone()
            .unwrap_or_else(|| self.target_root.join("etc/fstab"))
    }

    /// The guest's boot directory inside the target tree.
    pub fn boot_dir(&self) -> PathBuf {
        self.target_root.join("boot")
    }

    /// The guest's bootloader defaults file inside the target tree.
    pub fn grub_default_path(&self) -> PathBuf {
        self.target_root.join("etc/default/grub")
    }

    /// Print configuration for `show config`.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  VIRTPREP_TARGET_ROOT: {}", self.target_root.display());
        println!("  fstab: {}", self.fstab_path().display());
        match &self.kernel_version {
            Some(v) => println!("  VIRTPREP_KERNEL_VERSION: {}", v),
            None => println!("  VIRTPREP_KERNEL_VERSION: (running kernel)"),
        }
        println!("  VIRTPREP_LOG_DIR: {}", self.log_dir.display());
        println!(
            "  console: {},{} earlycon={} boot delay {}s",
            self.console.device,
            self.console.baud,
            self.console.earlycon,
            self.console.boot_delay_secs
        );
        if self.target_root.is_dir() {
            println!("  target root: PRESENT");
        } else {
            println!("  target root: NOT PRESENT (created on first mount)");
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            let p = PathBuf::from(v.trim());
            if p.is_absolute() {
                p
            } else {
                // Relative overrides resolve against the working directory.
                Path::new(".").join(p)
            }
        })
}

fn env_u32(key: &str) -> Option<u32> {
    let raw = std::env::var(key).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u32>() {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("[WARN] {} is not a number ('{}'), using default", key, raw);
            None
        }
    }
}
