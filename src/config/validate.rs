// src/config/validate.rs

use std::collections::BTreeSet;

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SpoolError};
use crate::spool::normalize_perms;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SpoolError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let ignore = compile_ignore(&raw)?;
        raw.metadata.perms = normalize_perms(&raw.metadata.perms);
        Ok(ConfigFile::new_unchecked(raw, ignore))
    }
}

/// Run every check without building a [`ConfigFile`].
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_plugins(cfg)?;
    validate_plugin_names(cfg)?;
    validate_server(cfg)?;
    validate_metadata(cfg)?;
    Ok(())
}

fn ensure_has_plugins(cfg: &RawConfigFile) -> Result<()> {
    if cfg.priority.is_empty() && cfg.spool.is_empty() {
        return Err(SpoolError::ConfigError(
            "config must contain at least one [[priority]] or [[spool]] table".to_string(),
        ));
    }
    Ok(())
}

fn validate_plugin_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = BTreeSet::new();
    let names = cfg
        .priority
        .iter()
        .map(|p| p.name.as_str())
        .chain(cfg.spool.iter().map(|s| s.name.as_str()));
    for name in names {
        if name.trim().is_empty() {
            return Err(SpoolError::ConfigError(
                "plugin name must not be empty".to_string(),
            ));
        }
        if !seen.insert(name) {
            return Err(SpoolError::ConfigError(format!(
                "plugin '{}' is configured more than once",
                name
            )));
        }
    }
    for spool in &cfg.spool {
        if spool.entry_type.trim().is_empty() {
            return Err(SpoolError::ConfigError(format!(
                "[[spool]] '{}' has an empty entry_type",
                spool.name
            )));
        }
    }
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.encoding.trim().is_empty() {
        return Err(SpoolError::ConfigError(
            "[server].encoding must not be empty".to_string(),
        ));
    }
    compile_ignore(cfg)?;
    Ok(())
}

fn compile_ignore(cfg: &RawConfigFile) -> Result<Option<Regex>> {
    cfg.server
        .ignore
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern).map_err(|err| {
                SpoolError::ConfigError(format!("[server].ignore is not a valid regex: {err}"))
            })
        })
        .transpose()
}

fn validate_metadata(cfg: &RawConfigFile) -> Result<()> {
    let perms = &cfg.metadata.perms;
    let octal = !perms.is_empty() && perms.chars().all(|c| ('0'..='7').contains(&c));
    if !octal || !(3..=4).contains(&perms.len()) {
        return Err(SpoolError::ConfigError(format!(
            "[metadata].perms must be a 3 or 4 digit octal mode (got '{}')",
            perms
        )));
    }
    if cfg.metadata.owner.trim().is_empty() || cfg.metadata.group.trim().is_empty() {
        return Err(SpoolError::ConfigError(
            "[metadata].owner and [metadata].group must not be empty".to_string(),
        ));
    }
    Ok(())
}
