#![allow(dead_code)]

use std::path::Path;

use groupspool::config::{ConfigFile, PrioritySection, RawConfigFile, SpoolSection};
use groupspool::priority::NameMatch;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(repository: impl AsRef<Path>) -> Self {
        let mut config = RawConfigFile::default();
        config.server.repository = repository.as_ref().to_path_buf();
        Self { config }
    }

    pub fn with_priority(mut self, name: &str) -> Self {
        self.config.priority.push(PrioritySection {
            name: name.to_string(),
            path: None,
            names: NameMatch::Exact,
        });
        self
    }

    pub fn with_pattern_priority(mut self, name: &str) -> Self {
        self.config.priority.push(PrioritySection {
            name: name.to_string(),
            path: None,
            names: NameMatch::Pattern,
        });
        self
    }

    pub fn with_spool(mut self, name: &str) -> Self {
        self.config.spool.push(SpoolSection {
            name: name.to_string(),
            path: None,
            entry_type: "Path".to_string(),
        });
        self
    }

    pub fn with_ignore(mut self, pattern: &str) -> Self {
        self.config.server.ignore = Some(pattern.to_string());
        self
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.config.metadata.owner = owner.to_string();
        self
    }

    pub fn with_perms(mut self, perms: &str) -> Self {
        self.config.metadata.perms = perms.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
