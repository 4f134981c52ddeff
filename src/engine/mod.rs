// src/engine/mod.rs

//! Resolution engine.
//!
//! [`Engine`] owns every configured [`PriorityMatcher`] and [`SpoolManager`].
//! Each sits behind its own `RwLock`: notifications take the write side of
//! exactly one component, resolution requests only ever take read locks, so
//! many requests can be served while notifications keep arriving.
//!
//! The async shell that feeds notifications in delivery order lives in
//! [`runtime`].

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::{Result, SpoolError};
use crate::fs::FileSystem;
use crate::priority::PriorityMatcher;
use crate::spool::{SpecificFile, SpoolManager};
use crate::types::{ClientMetadata, FileEvent};
use crate::watch::FileMonitor;
use crate::xml::Element;

pub mod runtime;

pub use runtime::{Runtime, drain_pending};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
pub struct Engine {
    matchers: Vec<RwLock<PriorityMatcher>>,
    spools: Vec<RwLock<SpoolManager<SpecificFile>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one component per `[[priority]]` / `[[spool]]` table.
    ///
    /// Each component registers its root with `monitor` immediately; the
    /// initial `exists` batch still has to be fed through
    /// [`Engine::handle_event`].
    pub fn from_config(
        cfg: &ConfigFile,
        fs: Arc<dyn FileSystem>,
        monitor: Arc<dyn FileMonitor>,
    ) -> Result<Self> {
        let mut engine = Self::new();
        for section in &cfg.priority {
            let root = cfg.plugin_root(section.dir());
            info!(name = %section.name, ?root, "adding priority matcher");
            let matcher = PriorityMatcher::new(
                &section.name,
                root,
                Arc::clone(&fs),
                Arc::clone(&monitor),
            )?
            .with_name_match(section.names)
            .with_ignore(cfg.ignore.clone());
            engine.add_matcher(matcher);
        }
        for section in &cfg.spool {
            let root = cfg.plugin_root(section.dir());
            info!(name = %section.name, ?root, entry_type = %section.entry_type, "adding spool");
            let spool = SpoolManager::new(
                &section.name,
                root,
                Arc::clone(&fs),
                Arc::clone(&monitor),
            )?
            .with_entry_type(&section.entry_type)
            .with_encoding(&cfg.server.encoding)
            .with_defaults(cfg.metadata.clone())
            .with_ignore(cfg.ignore.clone());
            engine.add_spool(spool);
        }
        Ok(engine)
    }

    pub fn add_matcher(&mut self, matcher: PriorityMatcher) {
        self.matchers.push(RwLock::new(matcher));
    }

    pub fn add_spool(&mut self, spool: SpoolManager<SpecificFile>) {
        self.spools.push(RwLock::new(spool));
    }

    pub fn matchers(&self) -> &[RwLock<PriorityMatcher>] {
        &self.matchers
    }

    pub fn spools(&self) -> &[RwLock<SpoolManager<SpecificFile>>] {
        &self.spools
    }

    /// Route a notification to the component owning its handle.
    ///
    /// Returns `false` if nobody owns the handle; the event is dropped.
    pub fn handle_event(&self, event: &FileEvent) -> bool {
        for matcher in &self.matchers {
            if read(matcher).owns(event.handle) {
                write(matcher).handle_event(event);
                return true;
            }
        }
        for spool in &self.spools {
            if read(spool).owns(event.handle) {
                write(spool).handle_event(event);
                return true;
            }
        }
        warn!(
            handle = %event.handle,
            filename = %event.filename,
            action = %event.action,
            "got event with unknown handle"
        );
        false
    }

    /// Bind `entry` for `metadata` and return its final attributes.
    ///
    /// Spools are asked first, then priority matchers, each in configuration
    /// order; the first component that knows the entry decides.
    pub fn resolve(
        &self,
        metadata: &ClientMetadata,
        entry: &mut Element,
    ) -> Result<BTreeMap<String, String>> {
        for spool in &self.spools {
            let spool = read(spool);
            if spool.handles_entry(entry) {
                debug!(spool = %spool.name(), %entry, host = %metadata.hostname, "binding entry");
                spool.bind_entry(entry, metadata)?;
                return Ok(entry.attributes.clone());
            }
        }
        for matcher in &self.matchers {
            let matcher = read(matcher);
            if matcher.handles_entry(entry) {
                debug!(matcher = %matcher.name(), %entry, host = %metadata.hostname, "binding entry");
                matcher.bind_entry(entry, metadata)?;
                return Ok(entry.attributes.clone());
            }
        }
        Err(SpoolError::NotHandled {
            tag: entry.tag.clone(),
            name: entry.name().unwrap_or_default().to_string(),
        })
    }
}
