pub mod config;
pub mod inspect;
pub mod list;
pub mod run;

use std::path::Path;

use addin_core::AddinHostConfig;
use anyhow::Result;

/// Load the config from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<AddinHostConfig> {
    let config = match path {
        Some(path) => AddinHostConfig::load_from(path)?,
        None => AddinHostConfig::load()?,
    };
    Ok(config)
}
