// src/config/model.rs

use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;

use crate::priority::NameMatch;
use crate::spool::FileMetadata;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [server]
/// repository = "/var/lib/groupspool"
/// ignore = '^(\.#.*|.*~)$'
///
/// [metadata]
/// owner = "root"
/// perms = "0644"
///
/// [[priority]]
/// name = "Pkgmgr"
///
/// [[spool]]
/// name = "Cfg"
/// ```
///
/// Every section is optional; validation insists on at least one plugin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    /// Built-in file metadata defaults from `[metadata]`.
    #[serde(default)]
    pub metadata: FileMetadata,

    /// `[[priority]]` tables, in order.
    #[serde(default)]
    pub priority: Vec<PrioritySection>,

    /// `[[spool]]` tables, in order.
    #[serde(default)]
    pub spool: Vec<SpoolSection>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so the compiled
/// `ignore` filter is always consistent with `server.ignore`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub metadata: FileMetadata,
    pub priority: Vec<PrioritySection>,
    pub spool: Vec<SpoolSection>,
    pub ignore: Option<Regex>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, ignore: Option<Regex>) -> Self {
        Self {
            server: raw.server,
            metadata: raw.metadata,
            priority: raw.priority,
            spool: raw.spool,
            ignore,
        }
    }

    /// Absolute (or repository-relative) root of a plugin directory.
    pub fn plugin_root(&self, dir: &str) -> PathBuf {
        self.server.repository.join(dir)
    }

    /// Names of all configured plugins, in configuration order.
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.priority
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.spool.iter().map(|s| s.name.as_str()))
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Root of the configuration corpus.
    #[serde(default = "default_repository")]
    pub repository: PathBuf,

    /// Encoding passed to every entry set.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Regex over event filenames; matches are dropped by every cache.
    #[serde(default)]
    pub ignore: Option<String>,
}

fn default_repository() -> PathBuf {
    PathBuf::from(".")
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            encoding: default_encoding(),
            ignore: None,
        }
    }
}

/// `[[priority]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct PrioritySection {
    pub name: String,

    /// Directory below the repository; defaults to `name`.
    #[serde(default)]
    pub path: Option<String>,

    /// `"exact"` (default) or `"pattern"`.
    #[serde(default)]
    pub names: NameMatch,
}

impl PrioritySection {
    pub fn dir(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

/// `[[spool]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SpoolSection {
    pub name: String,

    /// Directory below the repository; defaults to `name`.
    #[serde(default)]
    pub path: Option<String>,

    /// Tag of the entries this spool binds.
    #[serde(default = "default_entry_type")]
    pub entry_type: String,
}

fn default_entry_type() -> String {
    "Path".to_string()
}

impl SpoolSection {
    pub fn dir(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

