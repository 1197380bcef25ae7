//! CLI subcommands.

pub mod audit;
pub mod batch;
pub mod dedupe;

use std::path::Path;

use tissrec_core::TissConfig;

/// Output format shared by the tabular commands.
#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

/// Load the config file when given, defaults otherwise.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<TissConfig> {
    match config_path {
        Some(path) => Ok(TissConfig::from_file(Path::new(path))?),
        None => Ok(TissConfig::default()),
    }
}
