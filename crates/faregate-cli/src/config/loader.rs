use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::model::BatchConfig;
use crate::config::validate::validate_config;

/// Read and deserialize a batch file. No semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<BatchConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading batch file at {:?}", path))?;

    let config: BatchConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML batch file from {:?}", path))?;

    Ok(config)
}

/// Load a batch file and run [`validate_config`] on it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<BatchConfig> {
    let path = path.as_ref();
    let config = load_from_path(path)?;
    validate_config(&config).with_context(|| format!("invalid batch file {:?}", path))?;
    Ok(config)
}
