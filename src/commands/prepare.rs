//! Prepare command - runs the whole preparation pipeline.

use anyhow::Result;

use crate::config::Config;
use crate::pipeline;

/// Execute the prepare command.
pub fn cmd_prepare(config: &Config) -> Result<()> {
    pipeline::run_pipeline(config)
}
