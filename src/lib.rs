//! Virtprep library exports for testing.
//!
//! This module exposes internal components for integration testing.

pub mod backup;
pub mod bootloader;
pub mod config;
pub mod error;
pub mod logging;
pub mod mount;
pub mod preflight;
pub mod privilege;
pub mod process;
pub mod ramdisk;
