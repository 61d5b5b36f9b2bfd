//! Mount-table resolution, fstab planning, and plan execution.

pub mod executor;
pub mod fstab;
pub mod table;

pub use executor::{apply, MountOutcome, MountReport, MountResult};
pub use fstab::{parse_fstab, MountEntry};
pub use table::{mount_root, MountTable, RootMountStatus, PROC_MOUNTS};
