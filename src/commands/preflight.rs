//! Preflight command - runs preflight checks.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(config: &Config, strict: bool) -> Result<()> {
    let report = preflight::run_preflight(config);
    report.print();

    if !report.all_passed() {
        if strict {
            bail!(
                "Preflight failed: {} check(s) failed. Fix the issues above before preparing.",
                report.fail_count()
            );
        }
        println!("Some checks failed. Use --strict to fail the run.");
    }
    Ok(())
}
