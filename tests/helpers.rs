//! Shared test utilities for virtprep tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use virtprep::config::{Config, ConsoleConfig};

/// Test environment with a throwaway guest tree under a tempdir.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Base directory holding fixtures and the log dir
    pub base_dir: PathBuf,
    /// Mock guest tree (mount target, boot dir, etc/)
    pub target_root: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with an empty guest tree.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().to_path_buf();
        let target_root = base_dir.join("guest");
        fs::create_dir_all(&target_root).expect("Failed to create target root");

        Self {
            _temp_dir: temp_dir,
            base_dir,
            target_root,
        }
    }

    /// A config pointed at this env's guest tree. The kernel version is
    /// pinned so tests never depend on the host's `uname -r`.
    pub fn config(&self) -> Config {
        Config {
            target_root: self.target_root.clone(),
            fstab_override: None,
            kernel_version: Some("5.4.0".to_string()),
            log_dir: self.base_dir.join("log"),
            console: ConsoleConfig::default(),
        }
    }

    /// Write a fake mount table in /proc/self/mounts format and return its
    /// path. Each line is `source target fstype options freq pass`.
    pub fn write_mounts_fixture(&self, lines: &[&str]) -> PathBuf {
        let path = self.base_dir.join("mounts");
        let mut content = String::new();
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(&path, content).expect("Failed to write mounts fixture");
        path
    }

    /// Write the guest's mount descriptor at etc/fstab and return its path.
    pub fn write_fstab(&self, content: &str) -> PathBuf {
        let path = self.target_root.join("etc/fstab");
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create etc");
        fs::write(&path, content).expect("Failed to write fstab");
        path
    }

    /// Drop a boot image with known content into the guest's boot dir.
    pub fn write_boot_image(&self, name: &str, content: &[u8]) -> PathBuf {
        let boot = self.target_root.join("boot");
        fs::create_dir_all(&boot).expect("Failed to create boot dir");
        let path = boot.join(name);
        fs::write(&path, content).expect("Failed to write boot image");
        path
    }

    /// Write the guest's etc/default/grub and return its path.
    pub fn write_grub_default(&self, content: &str) -> PathBuf {
        let path = self.target_root.join("etc/default/grub");
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create etc/default");
        fs::write(&path, content).expect("Failed to write grub default");
        path
    }
}

/// Assert that a path exists, with a readable failure message.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "expected file to exist: {}", path.display());
}

/// Assert that a file's content contains the given needle.
pub fn assert_file_contains(path: &Path, needle: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    assert!(
        content.contains(needle),
        "expected {} to contain {:?}, got:\n{}",
        path.display(),
        needle,
        content
    );
}
