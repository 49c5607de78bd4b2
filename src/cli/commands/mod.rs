//! CLI command handlers.

pub mod investigate;
pub mod tools;

use anyhow::Result;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Load configuration and install logging for a command.
///
/// The returned logger must be held for the duration of the command so
/// buffered file output is flushed on exit.
pub fn bootstrap(config_path: Option<&std::path::Path>) -> Result<(Config, LoggerImpl)> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;
    Ok((config, logger))
}
