//! `db_config.json` persistence

use crate::client::ConnectionParams;
use eyre::{Context, Result};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "db_config.json";

/// Read connection parameters saved by `pgsnap config`
pub fn read_config_file(path: impl AsRef<Path>) -> Result<ConnectionParams> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Write connection parameters as pretty-printed JSON
pub fn write_config_file(path: impl AsRef<Path>, params: &ConnectionParams) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(params)?;
    std::fs::write(path, format!("{}\n", json))
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}
