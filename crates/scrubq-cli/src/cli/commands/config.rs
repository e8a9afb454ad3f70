//! `scrubq config` – print the effective configuration.

use anyhow::Result;
use scrubq_core::config::{self, ScrubConfig};
use scrubq_core::logging;
use std::path::Path;

pub fn run_config(cfg: &ScrubConfig, explicit: Option<&Path>) -> Result<()> {
    let source = match explicit {
        Some(path) => path.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# config: {}", source.display());
    if let Ok(log) = logging::log_file_path() {
        println!("# log:    {}", log.display());
    }
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
