// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a configuration file without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - at least one plugin, with unique names,
///   - a compilable `[server].ignore` regex,
///   - sane `[metadata]` values.
///
/// A relative `[server].repository` is resolved against the directory
/// holding the configuration file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;
    if raw_config.server.repository.is_relative() {
        if let Some(parent) = path.parent() {
            raw_config.server.repository = parent.join(&raw_config.server.repository);
        }
    }
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `groupspool.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("groupspool.toml")
}
