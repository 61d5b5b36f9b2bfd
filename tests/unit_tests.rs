//! Unit tests for virtprep library functions.
//!
//! These tests exercise the public surface against throwaway fixture trees.
//! Nothing here runs a mount, a chroot, or a generator; behavior that
//! shells out is covered by the integration tests.

mod helpers;

use helpers::{assert_file_contains, assert_file_exists, TestEnv};
use std::fs;
use std::path::Path;
use virtprep::config::ConsoleConfig;
use virtprep::error::PrepError;
use virtprep::mount::{parse_fstab, MountTable};
use virtprep::{backup, bootloader, logging, ramdisk};

// =============================================================================
// mount/fstab.rs tests
// =============================================================================

#[test]
fn test_parse_fstab_drops_swap_and_keeps_data() {
    let env = TestEnv::new();
    let fstab = env.write_fstab(
        "UUID=abc /data ext4 defaults 0 2\n\
         swap /swap swap swap 0 0\n",
    );

    let plan = parse_fstab(&fstab).expect("parse should succeed");

    assert_eq!(plan.len(), 1, "swap line must not be planned");
    assert_eq!(plan[0].source, "UUID=abc");
    assert_eq!(plan[0].fstype, "ext4");
    assert_eq!(
        plan[0].full_target(&env.target_root),
        env.target_root.join("data")
    );
}

#[test]
fn test_parse_fstab_skips_comments_and_malformed() {
    let env = TestEnv::new();
    let fstab = env.write_fstab(
        "# static filesystem table\n\
         \n\
         /dev/vda2 /home ext4 defaults 0 2\n\
         broken-line-with-two fields\n\
         /dev/vda3 /var xfs rw,noatime 0 2\n",
    );

    let plan = parse_fstab(&fstab).expect("parse should succeed");

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].target, "/home");
    assert_eq!(plan[1].target, "/var");
    assert_eq!(plan[1].options_string(), "rw,noatime");
}

#[test]
fn test_parse_fstab_preserves_descriptor_order() {
    let env = TestEnv::new();
    let fstab = env.write_fstab(
        "/dev/vda3 /var ext4 defaults 0 2\n\
         /dev/vda2 /home ext4 defaults 0 2\n\
         /dev/vda4 /srv ext4 defaults 0 2\n",
    );

    let plan = parse_fstab(&fstab).expect("parse should succeed");

    let targets: Vec<&str> = plan.iter().map(|e| e.target.as_str()).collect();
    assert_eq!(targets, ["/var", "/home", "/srv"]);
}

#[test]
fn test_parse_fstab_defaults_missing_options() {
    let env = TestEnv::new();
    let fstab = env.write_fstab("/dev/vdb1 /opt ext4\n");

    let plan = parse_fstab(&fstab).expect("parse should succeed");

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].options_string(), "defaults");
}

#[test]
fn test_parse_fstab_root_entry_maps_to_target_root() {
    let env = TestEnv::new();
    let fstab = env.write_fstab("/dev/vda1 / ext4 defaults 0 1\n");

    let plan = parse_fstab(&fstab).expect("parse should succeed");

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].full_target(&env.target_root), env.target_root);
}

#[test]
fn test_parse_fstab_missing_descriptor_is_not_found() {
    let env = TestEnv::new();

    let err = parse_fstab(&env.target_root.join("etc/fstab")).unwrap_err();

    assert_eq!(err.exit_code(), 12);
    assert!(matches!(err, PrepError::NotFound { .. }));
}

// =============================================================================
// mount/table.rs tests
// =============================================================================

#[test]
fn test_mount_table_root_source_last_record_wins() {
    let env = TestEnv::new();
    let mounts = env.write_mounts_fixture(&[
        "proc /proc proc rw 0 0",
        "/dev/vda1 / ext4 rw 0 0",
        "/dev/mapper/vg-root / ext4 rw 0 0",
        "tmpfs /tmp tmpfs rw 0 0",
    ]);

    let table = MountTable::load(&mounts).expect("load should succeed");

    assert_eq!(
        table.root_source().expect("root source"),
        "/dev/mapper/vg-root"
    );
}

#[test]
fn test_mount_table_root_source_requires_device_path() {
    let env = TestEnv::new();
    let mounts = env.write_mounts_fixture(&[
        "rootfs / rootfs rw 0 0",
        "overlay / overlay rw 0 0",
        "proc /proc proc rw 0 0",
    ]);

    let table = MountTable::load(&mounts).expect("load should succeed");
    let err = table.root_source().unwrap_err();

    assert_eq!(err.exit_code(), 11);
    assert!(matches!(err, PrepError::Resolution { .. }));
}

#[test]
fn test_mount_table_decodes_octal_escapes() {
    let env = TestEnv::new();
    let mounts =
        env.write_mounts_fixture(&[r"/dev/vdb1 /mnt/with\040space ext4 rw 0 0"]);

    let table = MountTable::load(&mounts).expect("load should succeed");

    assert!(table.target_mounted(Path::new("/mnt/with space")));
    assert!(!table.target_mounted(Path::new(r"/mnt/with\040space")));
}

#[test]
fn test_mount_table_target_occupancy_is_exact() {
    let env = TestEnv::new();
    let mounts = env.write_mounts_fixture(&["/dev/vdb1 /mnt/a ext4 rw 0 0"]);

    let table = MountTable::load(&mounts).expect("load should succeed");

    // The source device does not exist on the test host, so the check falls
    // back to target occupancy. Only the recorded target counts.
    assert!(table.is_mounted("/dev/vdb1", Path::new("/mnt/a")));
    assert!(!table.is_mounted("/dev/vdb1", Path::new("/mnt")));
    assert!(!table.is_mounted("/dev/vdb1", Path::new("/mnt/a/sub")));
}

// =============================================================================
// ramdisk.rs tests
// =============================================================================

#[test]
fn test_find_boot_image_ignores_other_kernel_versions() {
    let env = TestEnv::new();
    env.write_boot_image("initrd.img-6.1.0", b"newer");
    let wanted = env.write_boot_image("initrd.img-5.4.0", b"requested");

    let found = ramdisk::find_boot_image(&env.target_root.join("boot"), "5.4.0")
        .expect("image should be found");

    assert_eq!(found, wanted);
}

#[test]
fn test_find_boot_image_miss_names_expected_path() {
    let env = TestEnv::new();
    fs::create_dir_all(env.target_root.join("boot")).unwrap();

    let err = ramdisk::find_boot_image(&env.target_root.join("boot"), "5.4.0").unwrap_err();

    assert_eq!(err.exit_code(), 12);
    match err {
        PrepError::NotFound { path } => {
            assert!(
                path.to_string_lossy().contains("5.4.0"),
                "missing-image error must name the kernel version: {}",
                path.display()
            );
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

// =============================================================================
// backup.rs tests
// =============================================================================

#[test]
fn test_backup_of_located_boot_image() {
    let env = TestEnv::new();
    let image = env.write_boot_image("initrd.img-5.4.0", b"compressed ramdisk \x1f\x8b\x00");

    let found = ramdisk::find_boot_image(&env.target_root.join("boot"), "5.4.0")
        .expect("image should be found");
    assert_eq!(found, image);

    let bak = backup::backup_file(&found).expect("backup should succeed");

    assert_eq!(bak, env.target_root.join("boot/initrd.img-5.4.0.bak"));
    assert_file_exists(&bak);
    assert_eq!(
        fs::read(&image).unwrap(),
        fs::read(&bak).unwrap(),
        "backup must be byte-identical to the original"
    );
}

// =============================================================================
// bootloader.rs tests
// =============================================================================

#[test]
fn test_inject_console_rewrites_grub_default() {
    let env = TestEnv::new();
    let grub = env.write_grub_default("GRUB_CMDLINE_LINUX=\"rhgb quiet\"\nGRUB_TIMEOUT=10\n");

    let changed = bootloader::inject_console(&grub, &ConsoleConfig::default())
        .expect("grub defaults rewrite");

    assert!(changed);
    assert_file_contains(&grub, "console=ttyS0,115200n8 earlyprintk=ttyS0,115200");
    assert_file_contains(&grub, "GRUB_TIMEOUT=3");
}

#[test]
fn test_inject_console_second_run_leaves_file_alone() {
    let env = TestEnv::new();
    let grub = env.write_grub_default("GRUB_CMDLINE_LINUX=\"rhgb quiet\"\nGRUB_TIMEOUT=10\n");

    bootloader::inject_console(&grub, &ConsoleConfig::default()).expect("first pass");
    let configured = fs::read(&grub).unwrap();

    let changed = bootloader::inject_console(&grub, &ConsoleConfig::default())
        .expect("second pass on configured file");

    assert!(!changed, "marker must short-circuit the rewrite");
    assert_eq!(fs::read(&grub).unwrap(), configured);
}

// =============================================================================
// logging.rs tests
// =============================================================================

#[test]
fn test_logging_init_creates_audit_log() {
    let env = TestEnv::new();
    let log_dir = env.base_dir.join("log");

    let guard = logging::init(&log_dir);

    assert!(guard.is_some(), "writable dir should get a file layer");
    assert_file_exists(&log_dir.join("virtprep.log"));
}

#[test]
fn test_logging_init_degrades_without_writable_dir() {
    let env = TestEnv::new();
    let blocker = env.base_dir.join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    // log dir nested under a regular file can never be created
    let guard = logging::init(&blocker.join("log"));

    assert!(guard.is_none());
}
