// src/spool/manager.rs

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error, warn};

use crate::errors::{Result, SpoolError};
use crate::fs::FileSystem;
use crate::spool::entry_set::{EntrySet, SpecificData};
use crate::spool::info::FileMetadata;
use crate::types::{ClientMetadata, EventAction, FileEvent, WatchHandle};
use crate::watch::FileMonitor;
use crate::watch::path_utils::is_same_or_descendant;
use crate::xml::Element;

/// Mirrors a directory tree of group/host-specific files.
///
/// Every directory below the root gets a watch; every regular file feeds the
/// [`EntrySet`] named after its parent directory, so `<root>/etc/motd/motd.H_foo`
/// is a variant of the logical path `/etc/motd`.
///
/// Handles are stored as `/`-framed relative paths (`/`, `/etc/`,
/// `/etc/motd/`) and never removed.
pub struct SpoolManager<T: SpecificData> {
    name: String,
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    monitor: Arc<dyn FileMonitor>,
    handles: HashMap<WatchHandle, String>,
    entries: BTreeMap<String, EntrySet<T>>,
    entry_type: String,
    encoding: String,
    defaults: FileMetadata,
    ignore: Option<Regex>,
}

impl<T: SpecificData> fmt::Debug for SpoolManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpoolManager")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("handles", &self.handles)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<T: SpecificData> SpoolManager<T> {
    /// Create the manager and watch `root`.
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        monitor: Arc<dyn FileMonitor>,
    ) -> Result<Self> {
        let root: PathBuf = root.into();
        let mut manager = Self {
            name: name.into(),
            root,
            fs,
            monitor,
            handles: HashMap::new(),
            entries: BTreeMap::new(),
            entry_type: "Path".to_string(),
            encoding: "UTF-8".to_string(),
            defaults: FileMetadata::default(),
            ignore: None,
        };
        manager.add_directory_monitor("")?;
        Ok(manager)
    }

    pub fn with_entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = entry_type.into();
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_defaults(mut self, defaults: FileMetadata) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_ignore(mut self, ignore: Option<Regex>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn handles(&self) -> &HashMap<WatchHandle, String> {
        &self.handles
    }

    pub fn entries(&self) -> &BTreeMap<String, EntrySet<T>> {
        &self.entries
    }

    pub fn entry_set(&self, ident: &str) -> Option<&EntrySet<T>> {
        self.entries.get(ident)
    }

    pub fn owns(&self, handle: WatchHandle) -> bool {
        self.handles.contains_key(&handle)
    }

    fn abs_path(&self, framed: &str) -> PathBuf {
        let relative = framed.trim_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Absolute path named by an event.
    pub fn event_path(&self, event: &FileEvent) -> Option<PathBuf> {
        let dir = self.handles.get(&event.handle)?;
        Some(self.abs_path(dir).join(&event.filename))
    }

    /// Logical identifier an event belongs to: the directory itself for a
    /// directory, the parent directory's path for a file.
    pub fn event_id(&self, event: &FileEvent) -> Option<String> {
        let dir = self.handles.get(&event.handle)?;
        let epath = self.event_path(event)?;
        if self.fs.is_dir(&epath) {
            Some(format!("{}{}", dir, event.filename))
        } else {
            Some(dir.trim_end_matches('/').to_string())
        }
    }

    /// Register a watch for `relative` unless one already exists.
    pub fn add_directory_monitor(&mut self, relative: &str) -> Result<()> {
        let trimmed = relative.trim_matches('/');
        let framed = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        };
        if self.handles.values().any(|h| *h == framed) {
            return Ok(());
        }
        let dirpath = self.abs_path(&framed);
        if !self.fs.is_dir(&dirpath) {
            error!(spool = %self.name, path = ?dirpath, "failed to open directory");
            return Ok(());
        }
        let handle = self.monitor.add_monitor(&dirpath)?;
        debug!(spool = %self.name, %handle, path = ?dirpath, "watching directory");
        self.handles.insert(handle, framed);
        Ok(())
    }

    /// Apply one notification.
    pub fn handle_event(&mut self, event: &FileEvent) {
        if event.action == EventAction::EndExist || event.filename.starts_with('/') {
            return;
        }
        let Some(dir) = self.handles.get(&event.handle).cloned() else {
            warn!(
                spool = %self.name,
                handle = %event.handle,
                filename = %event.filename,
                "got event with unknown handle"
            );
            return;
        };
        if let Some(ignore) = &self.ignore {
            if ignore.is_match(&event.filename) {
                debug!(filename = %event.filename, "ignoring event");
                return;
            }
        }
        let Some(ident) = self.event_id(event) else {
            return;
        };
        if ident.is_empty() && event.action != EventAction::Deleted {
            debug!(spool = %self.name, filename = %event.filename, "ignoring file at spool root");
            return;
        }

        match event.action {
            EventAction::Exists | EventAction::Created => self.add_entry(event),
            EventAction::Changed => {
                if let Some(entry_set) = self.entries.get_mut(&ident) {
                    entry_set.handle_event(&event.filename, event.action, self.fs.as_ref());
                } else {
                    warn!(spool = %self.name, %ident, "got changed event for unknown file");
                    self.add_entry(event);
                }
            }
            EventAction::Deleted => {
                let fbase = format!("{dir}{}", event.filename);
                let is_directory = self
                    .entries
                    .keys()
                    .any(|key| is_same_or_descendant(key, &fbase));
                if is_directory {
                    self.entries
                        .retain(|key, _| !is_same_or_descendant(key, &fbase));
                    debug!(spool = %self.name, path = %fbase, "directory deleted");
                } else if let Some(entry_set) = self.entries.get_mut(&ident) {
                    entry_set.handle_event(&event.filename, event.action, self.fs.as_ref());
                } else {
                    warn!(spool = %self.name, %ident, "got deleted event for unknown file");
                }
            }
            other => warn!(
                spool = %self.name,
                action = %other,
                filename = %event.filename,
                "got unknown event"
            ),
        }
    }

    /// Watch a new directory, or route a file to its entry set (creating
    /// the set on first sight).
    pub fn add_entry(&mut self, event: &FileEvent) {
        let (Some(epath), Some(ident)) = (self.event_path(event), self.event_id(event)) else {
            return;
        };

        if self.fs.is_dir(&epath) {
            if let Err(err) = self.add_directory_monitor(&ident) {
                error!(spool = %self.name, path = ?epath, error = %err, "failed to watch directory");
            }
            return;
        }

        if ident.is_empty() {
            debug!(spool = %self.name, path = ?epath, "ignoring file at spool root");
            return;
        }

        if !self.entries.contains_key(&ident) && self.fs.is_file(&epath) {
            let basename = ident.rsplit('/').next().unwrap_or_default().to_string();
            let dirpath = self.abs_path(&ident);
            match EntrySet::new(
                basename,
                dirpath,
                self.entry_type.clone(),
                self.encoding.clone(),
                self.defaults.clone(),
            ) {
                Ok(entry_set) => {
                    debug!(spool = %self.name, %ident, "new entry set");
                    self.entries.insert(ident.clone(), entry_set);
                }
                Err(err) => {
                    error!(spool = %self.name, %ident, error = %err, "failed to create entry set");
                    return;
                }
            }
        }

        let fs = Arc::clone(&self.fs);
        if let Some(entry_set) = self.entries.get_mut(&ident) {
            entry_set.handle_event(&event.filename, event.action, fs.as_ref());
        }
    }

    /// Whether `entry` names a logical path this spool knows.
    pub fn handles_entry(&self, entry: &Element) -> bool {
        entry.tag == self.entry_type
            && entry.name().is_some_and(|name| self.entries.contains_key(name))
    }

    pub fn bind_entry(&self, entry: &mut Element, metadata: &ClientMetadata) -> Result<()> {
        let name = entry.name().unwrap_or_default().to_string();
        let entry_set = self
            .entries
            .get(&name)
            .filter(|_| entry.tag == self.entry_type)
            .ok_or_else(|| SpoolError::NotHandled {
                tag: entry.tag.clone(),
                name: name.clone(),
            })?;
        entry_set.bind_entry(entry, metadata)
    }
}
