//! Serial-console reconfiguration of the target's bootloader.
//!
//! Runs a small state machine per invocation: back up the grub default
//! file, inject the console parameters (skipped when the marker is already
//! there, so repeated runs never accumulate duplicates), bind the host's
//! `/dev`, `/proc`, `/sys` into the target, and regenerate the final grub
//! configuration inside a chroot. The generator needs those binds to see
//! live device state; without them it cannot resolve the target's root
//! device from inside the chroot.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nix::mount::{mount, umount2, MntFlags, MsFlags};
use tracing::{info, warn};

use crate::backup::backup_file;
use crate::config::{Config, ConsoleConfig};
use crate::error::PrepError;
use crate::mount::table::{MountTable, PROC_MOUNTS};
use crate::process::Cmd;

/// States of one reconfiguration run. `Regenerated` is the only success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrubState {
    NotConfigured,
    BackedUp,
    LineInjected,
    ChrootBound,
    Regenerated,
}

impl fmt::Display for GrubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotConfigured => "not-configured",
            Self::BackedUp => "backed-up",
            Self::LineInjected => "line-injected",
            Self::ChrootBound => "chroot-bound",
            Self::Regenerated => "regenerated",
        })
    }
}

fn advance(state: &mut GrubState, next: GrubState) {
    info!(from = %state, to = %next, "bootloader state transition");
    *state = next;
}

/// Bind mounts of `/dev`, `/proc`, `/sys` under the target tree.
///
/// Acquisition skips binds whose targets are already mounted, so repeat
/// runs do not stack. Release detaches in reverse order; `Drop` covers the
/// failure paths so an early return cannot leak a bind.
pub struct ChrootBinds {
    held: Vec<PathBuf>,
}

impl ChrootBinds {
    pub fn acquire(target_root: &Path) -> Result<Self, PrepError> {
        let mut binds = Self { held: Vec::new() };
        for name in ["dev", "proc", "sys"] {
            let source = Path::new("/").join(name);
            let target = target_root.join(name);

            let table = MountTable::load(Path::new(PROC_MOUNTS))?;
            if table.target_mounted(&target) {
                info!(target = %target.display(), "bind target already mounted, keeping");
                continue;
            }

            fs::create_dir_all(&target).map_err(|e| PrepError::io(&target, e))?;
            mount(
                Some(source.as_path()),
                &target,
                None::<&str>,
                MsFlags::MS_BIND | MsFlags::MS_REC,
                None::<&str>,
            )
            .map_err(|e| {
                PrepError::mount(source.display().to_string(), &target, e.to_string())
            })?;
            info!(source = %source.display(), target = %target.display(), "bound into target");
            binds.held.push(target);
        }
        Ok(binds)
    }

    /// Detach the held binds, most recent first.
    pub fn release(&mut self) -> Result<(), PrepError> {
        while let Some(target) = self.held.pop() {
            umount2(&target, MntFlags::MNT_DETACH)
                .map_err(|e| PrepError::io(&target, io::Error::from_raw_os_error(e as i32)))?;
            info!(target = %target.display(), "bind released");
        }
        Ok(())
    }
}

impl Drop for ChrootBinds {
    fn drop(&mut self) {
        while let Some(target) = self.held.pop() {
            if let Err(e) = umount2(&target, MntFlags::MNT_DETACH) {
                warn!(target = %target.display(), error = %e, "bind left mounted");
            }
        }
    }
}

/// Run the full reconfiguration state machine against the target tree.
pub fn reconfigure(config: &Config) -> Result<GrubState, PrepError> {
    let mut state = GrubState::NotConfigured;
    let grub_path = config.grub_default_path();
    if !grub_path.is_file() {
        return Err(PrepError::not_found(&grub_path));
    }

    let backup = backup_file(&grub_path)?;
    info!(file = %grub_path.display(), backup = %backup.display(), "bootloader config backed up");
    advance(&mut state, GrubState::BackedUp);

    inject_console(&grub_path, &config.console)?;
    advance(&mut state, GrubState::LineInjected);

    let mut binds = ChrootBinds::acquire(&config.target_root)?;
    advance(&mut state, GrubState::ChrootBound);

    // Release binds whether or not the generator ran through. A failed
    // release is logged rather than masking the generator's own result.
    let regenerated = regenerate(config);
    if let Err(e) = binds.release() {
        warn!(error = %e, "could not release chroot binds");
    }
    regenerated?;
    advance(&mut state, GrubState::Regenerated);
    Ok(state)
}

/// Rewrite the grub defaults file with the console command line and boot
/// delay. Returns whether the file changed; a file already carrying the
/// console marker is left byte-for-byte untouched.
pub fn inject_console(grub_path: &Path, console: &ConsoleConfig) -> Result<bool, PrepError> {
    let content = fs::read_to_string(grub_path).map_err(|e| PrepError::io(grub_path, e))?;
    match apply_console_settings(&content, console) {
        Some(updated) => {
            fs::write(grub_path, updated).map_err(|e| PrepError::io(grub_path, e))?;
            info!(
                device = console.device,
                baud = console.baud,
                "console parameters injected"
            );
            Ok(true)
        }
        None => {
            info!(
                marker = console_marker(console),
                "console marker already present, leaving file unchanged"
            );
            Ok(false)
        }
    }
}

#[derive(Debug)]
struct Generator {
    program: &'static str,
    /// Output path as seen from inside the chroot.
    output: &'static str,
}

/// The generator must be the target's own binary: the chroot runs it
/// against the guest's grub scripts and device map, not the host's.
fn probe_generator(target_root: &Path) -> Result<Generator, PrepError> {
    const CANDIDATES: [(&str, &str); 2] = [
        ("grub2-mkconfig", "/boot/grub2/grub.cfg"),
        ("grub-mkconfig", "/boot/grub/grub.cfg"),
    ];
    for (program, output) in CANDIDATES {
        for dir in ["usr/sbin", "sbin"] {
            if target_root.join(dir).join(program).is_file() {
                return Ok(Generator { program, output });
            }
        }
    }
    Err(PrepError::generation(
        "no grub config generator found in target tree (tried grub2-mkconfig, grub-mkconfig)",
    ))
}

fn regenerate(config: &Config) -> Result<(), PrepError> {
    let generator = probe_generator(&config.target_root)?;
    info!(
        program = generator.program,
        output = generator.output,
        "regenerating bootloader configuration"
    );
    let result = Cmd::new("chroot")
        .arg_path(&config.target_root)
        .args([generator.program, "-o", generator.output])
        .allow_fail()
        .run()
        .map_err(|e| PrepError::generation(format!("{e:#}")))?;
    if !result.success() {
        return Err(PrepError::generation(format!(
            "{} exited with code {}: {}",
            generator.program,
            result.code(),
            result.stderr_trimmed()
        )));
    }
    Ok(())
}

/// The idempotency marker: its presence anywhere in the file means the
/// console parameters were already injected.
fn console_marker(console: &ConsoleConfig) -> String {
    format!("console={}", console.device)
}

fn console_fragment(console: &ConsoleConfig) -> String {
    format!(
        " console={},{}n8 earlyprintk={},{}",
        console.device, console.baud, console.earlycon, console.baud
    )
}

/// Inject console and timeout settings, or `None` when the marker is
/// already present and the file must stay untouched.
fn apply_console_settings(content: &str, console: &ConsoleConfig) -> Option<String> {
    if content.contains(&console_marker(console)) {
        return None;
    }
    let injected = inject_cmdline(content, console);
    Some(set_timeout(&injected, console.boot_delay_secs))
}

fn inject_cmdline(content: &str, console: &ConsoleConfig) -> String {
    let fragment = console_fragment(console);
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let mut injected = false;

    for line in lines.iter_mut() {
        if let Some(value) = line.strip_prefix("GRUB_CMDLINE_LINUX=") {
            let existing = value.trim().trim_matches('"');
            *line = if existing.is_empty() {
                format!("GRUB_CMDLINE_LINUX=\"{}\"", fragment.trim_start())
            } else {
                format!("GRUB_CMDLINE_LINUX=\"{existing}{fragment}\"")
            };
            injected = true;
            break;
        }
    }
    if !injected {
        lines.push(format!("GRUB_CMDLINE_LINUX=\"{}\"", fragment.trim_start()));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn set_timeout(content: &str, delay_secs: u32) -> String {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let mut replaced = false;

    for line in lines.iter_mut() {
        if line.starts_with("GRUB_TIMEOUT=") {
            *line = format!("GRUB_TIMEOUT={delay_secs}");
            replaced = true;
            break;
        }
    }
    if !replaced {
        lines.push(format!("GRUB_TIMEOUT={delay_secs}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
