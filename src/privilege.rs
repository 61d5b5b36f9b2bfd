//! Privilege gate for mutating entry points.
//!
//! Mounting, bind-mounting, and chrooting all need root; every mutating
//! subcommand calls [`ensure_elevated`] before touching the filesystem so
//! a misconfigured invocation fails before any state changes.

use nix::unistd::Uid;

use crate::error::PrepError;

/// True if the effective uid is root.
pub fn is_elevated() -> bool {
    Uid::effective().is_root()
}

/// Fail with [`PrepError::Permission`] unless running as root.
pub fn ensure_elevated() -> Result<(), PrepError> {
    if is_elevated() {
        Ok(())
    } else {
        Err(PrepError::Permission)
    }
}
