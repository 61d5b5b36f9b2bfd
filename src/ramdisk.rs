//! Ramdisk image backup and regeneration.
//!
//! The image for the requested kernel version must already exist under the
//! target's boot directory; it is backed up with a verified copy before the
//! platform generator overwrites it. A failed regeneration leaves the
//! original image alone (generators write atomically or not at all), so
//! recovery is the `.bak` file, never an automatic restore.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::backup::backup_file;
use crate::config::Config;
use crate::error::PrepError;
use crate::process::{tool_exists, Cmd};

/// Generators probed on PATH, in preference order.
const GENERATORS: [&str; 3] = ["dracut", "mkinitrd", "update-initramfs"];

/// What a completed rebuild touched.
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub kernel_version: String,
    pub image: PathBuf,
    pub backup: PathBuf,
    pub generator: String,
}

/// Kernel version of the running host, from `uname -r`.
pub fn detect_running_kernel() -> Result<String, PrepError> {
    let result = Cmd::new("uname")
        .arg("-r")
        .run()
        .map_err(|e| PrepError::resolution(format!("cannot detect running kernel: {e:#}")))?;
    let version = result.stdout_trimmed().to_string();
    if version.is_empty() {
        return Err(PrepError::resolution("uname -r returned nothing"));
    }
    Ok(version)
}

/// Locate the ramdisk image for `kernel_version` under `boot_dir`.
///
/// Image naming differs per distribution family, so a fixed candidate list
/// is probed rather than globbing the directory.
pub fn find_boot_image(boot_dir: &Path, kernel_version: &str) -> Result<PathBuf, PrepError> {
    let candidates = [
        format!("initramfs-{kernel_version}.img"),
        format!("initrd.img-{kernel_version}"),
        format!("initrd-{kernel_version}"),
    ];
    for name in &candidates {
        let path = boot_dir.join(name);
        if path.is_file() {
            return Ok(path);
        }
    }
    warn!(
        boot_dir = %boot_dir.display(),
        kernel_version,
        probed = ?candidates,
        "no ramdisk image found"
    );
    Err(PrepError::not_found(boot_dir.join(&candidates[0])))
}

/// Back up and regenerate the ramdisk image for the configured kernel.
pub fn rebuild(config: &Config) -> Result<RebuildOutcome, PrepError> {
    let kernel_version = match &config.kernel_version {
        Some(v) => v.clone(),
        None => detect_running_kernel()?,
    };
    let boot_dir = config.boot_dir();
    let image = find_boot_image(&boot_dir, &kernel_version)?;

    let backup = backup_file(&image)?;
    info!(image = %image.display(), backup = %backup.display(), "ramdisk image backed up");

    let generator = GENERATORS
        .iter()
        .find(|name| tool_exists(name))
        .copied()
        .ok_or_else(|| {
            PrepError::rebuild(format!("no ramdisk generator on PATH (tried {GENERATORS:?})"))
        })?;

    info!(generator, kernel_version, image = %image.display(), "regenerating ramdisk");
    let result = run_generator(generator, &kernel_version, &image, config)
        .map_err(|e| PrepError::rebuild(format!("{e:#}")))?;
    if !result.success() {
        return Err(PrepError::rebuild(format!(
            "{generator} exited with code {}: {}",
            result.code(),
            result.stderr_trimmed()
        )));
    }

    info!(image = %image.display(), "ramdisk rebuilt");
    Ok(RebuildOutcome {
        kernel_version,
        image,
        backup,
        generator: generator.to_string(),
    })
}

/// Invoke one generator with its own argument convention.
fn run_generator(
    generator: &str,
    kernel_version: &str,
    image: &Path,
    config: &Config,
) -> anyhow::Result<crate::process::CommandResult> {
    let cmd = match generator {
        // Module resolution stays inside the guest tree via the sysroot flag.
        "dracut" => Cmd::new("dracut")
            .arg("--force")
            .arg("-r")
            .arg_path(&config.target_root)
            .arg_path(image)
            .arg(kernel_version),
        "mkinitrd" => Cmd::new("mkinitrd")
            .arg("-f")
            .arg_path(image)
            .arg(kernel_version),
        // update-initramfs derives the image name itself; point it at the
        // target's boot directory instead of the host's.
        _ => Cmd::new("update-initramfs")
            .arg("-u")
            .arg("-k")
            .arg(kernel_version)
            .arg("-b")
            .arg_path(&config.boot_dir()),
    };
    cmd.allow_fail().run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_boot_image_probes_all_namings() {
        let dir = TempDir::new().unwrap();
        let boot = dir.path();

        fs::write(boot.join("initrd.img-5.4.0"), b"image").unwrap();
        let found = find_boot_image(boot, "5.4.0").unwrap();
        assert_eq!(found, boot.join("initrd.img-5.4.0"));

        fs::write(boot.join("initramfs-6.1.0.img"), b"image").unwrap();
        let found = find_boot_image(boot, "6.1.0").unwrap();
        assert_eq!(found, boot.join("initramfs-6.1.0.img"));
    }

    #[test]
    fn test_find_boot_image_prefers_initramfs_naming() {
        let dir = TempDir::new().unwrap();
        let boot = dir.path();
        fs::write(boot.join("initramfs-5.4.0.img"), b"a").unwrap();
        fs::write(boot.join("initrd.img-5.4.0"), b"b").unwrap();

        let found = find_boot_image(boot, "5.4.0").unwrap();
        assert_eq!(found, boot.join("initramfs-5.4.0.img"));
    }

    #[test]
    fn test_find_boot_image_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = find_boot_image(dir.path(), "9.9.9").unwrap_err();
        assert_eq!(err.exit_code(), 12);
        assert!(matches!(err, PrepError::NotFound { .. }));
    }

    #[test]
    fn test_find_boot_image_ignores_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("initramfs-5.4.0.img")).unwrap();
        assert!(find_boot_image(dir.path(), "5.4.0").is_err());
    }

    #[test]
    fn test_detect_running_kernel_nonempty() {
        // uname is part of coreutils; present wherever these tests run.
        let version = detect_running_kernel().unwrap();
        assert!(!version.is_empty());
    }
}
