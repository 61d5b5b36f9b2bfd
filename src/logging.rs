//! Logging setup: operator output on stderr plus a durable audit file.
//!
//! The file sink is append-only (`<log_dir>/virtprep.log`, no rotation) so
//! a run's state transitions and errors survive as an audit trail
//! independent of the process exit status. Returns the appender's
//! `WorkerGuard`; the caller holds it for the process lifetime so buffered
//! lines flush on exit.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// File name of the audit log inside the configured log directory.
pub const LOG_FILE_NAME: &str = "virtprep.log";

/// Initialize the global subscriber.
///
/// Returns `None` (stderr-only logging) when the log directory cannot be
/// created, e.g. an unprivileged `preflight` run; mutating commands check
/// privileges separately, so this never aborts the process.
pub fn init(log_dir: &Path) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    match file_writer(log_dir) {
        Some((non_blocking, guard)) => {
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .try_init();
            eprintln!(
                "[WARN] cannot write {}, logging to stderr only",
                log_dir.join(LOG_FILE_NAME).display()
            );
            None
        }
    }
}

fn file_writer(
    log_dir: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir).ok()?;
    // rolling::never panics on an unwritable file; probe with a plain open.
    let path = log_dir.join(LOG_FILE_NAME);
    std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .ok()?;
    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    Some(tracing_appender::non_blocking(appender))
}
