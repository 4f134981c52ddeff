// src/cache/directory.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error, warn};

use crate::cache::{FileCache, FileIndex};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{EventAction, FileEvent, WatchHandle};
use crate::watch::path_utils::{is_same_or_descendant, join_relative, normalize, relative_str};
use crate::watch::FileMonitor;

/// Builds the index for a newly discovered file from its absolute path.
pub type ChildFactory<T> = Box<dyn Fn(&Path) -> T + Send + Sync>;

/// Coherent cache of a directory subtree.
///
/// `entries` maps paths relative to `root` to their [`FileCache`].
/// `handles` maps every watch ever registered to the relative directory it
/// covers; it only grows, because a deleted directory keeps its watch and
/// notifications resume if it reappears. `directories` is the set of
/// directories currently known to exist.
pub struct DirectoryCache<T: FileIndex> {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    monitor: Arc<dyn FileMonitor>,
    entries: BTreeMap<String, FileCache<T>>,
    handles: HashMap<WatchHandle, String>,
    directories: BTreeSet<String>,
    patterns: Regex,
    ignore: Option<Regex>,
    factory: ChildFactory<T>,
}

impl<T: FileIndex> fmt::Debug for DirectoryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryCache")
            .field("root", &self.root)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}

impl<T: FileIndex> DirectoryCache<T> {
    /// Create the cache and register a watch on `root` itself.
    ///
    /// Files become entries only if their name matches `patterns`.
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        monitor: Arc<dyn FileMonitor>,
        patterns: Regex,
        factory: ChildFactory<T>,
    ) -> Result<Self> {
        let mut cache = Self {
            root: root.into(),
            fs,
            monitor,
            entries: BTreeMap::new(),
            handles: HashMap::new(),
            directories: BTreeSet::new(),
            patterns,
            ignore: None,
            factory,
        };
        cache.add_directory_monitor("")?;
        Ok(cache)
    }

    /// Filter applied to the event filename before anything else.
    pub fn with_ignore(mut self, ignore: Option<Regex>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, relative: &str) -> Option<&FileCache<T>> {
        self.entries.get(relative)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &FileCache<T>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> &HashMap<WatchHandle, String> {
        &self.handles
    }

    pub fn directories(&self) -> &BTreeSet<String> {
        &self.directories
    }

    /// Whether an event carrying `handle` should be routed here.
    pub fn owns(&self, handle: WatchHandle) -> bool {
        self.handles.contains_key(&handle)
            || self.entries.values().any(|e| e.index().watches(handle))
    }

    fn abs_path(&self, relative: &str) -> PathBuf {
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Register a watch for `relative` unless one already exists.
    pub fn add_directory_monitor(&mut self, relative: &str) -> Result<()> {
        let relative = normalize(relative);
        let dirpath = self.abs_path(&relative);
        if self.handles.values().any(|r| *r == relative) {
            self.directories.insert(relative);
            return Ok(());
        }
        if !self.fs.is_dir(&dirpath) {
            error!(path = ?dirpath, "not a directory");
            return Ok(());
        }
        let handle = self.monitor.add_monitor(&dirpath)?;
        debug!(%handle, path = ?dirpath, "watching directory");
        self.handles.insert(handle, relative.clone());
        self.directories.insert(relative);
        Ok(())
    }

    /// Track a newly seen file and load it.
    pub fn add_entry(&mut self, relative: &str, action: EventAction) {
        if !self.entries.contains_key(relative) {
            let abspath = self.abs_path(relative);
            let index = (self.factory)(&abspath);
            self.entries.insert(
                relative.to_string(),
                FileCache::new(abspath, self.root.clone(), index),
            );
        }
        let fs = Arc::clone(&self.fs);
        let Some(entry) = self.entries.get_mut(relative) else {
            return;
        };
        if let Err(err) = entry.handle_event(action, fs.as_ref()) {
            error!(path = %relative, error = %err, "failed to load file; excluded until fixed");
        }
    }

    /// Apply one notification.
    pub fn handle_event(&mut self, event: &FileEvent) {
        let action = event.action;
        if action == EventAction::EndExist {
            return;
        }

        let Some(dir) = self.handles.get(&event.handle).cloned() else {
            self.handle_auxiliary_event(event);
            return;
        };

        // The first event of a registration names the directory itself.
        let filename = if Path::new(&event.filename).is_absolute() {
            match relative_str(&self.abs_path(&dir), Path::new(&event.filename)) {
                Some(rel) => rel,
                None => {
                    warn!(filename = %event.filename, "event path outside watched directory");
                    return;
                }
            }
        } else {
            normalize(&event.filename)
        };

        if let Some(ignore) = &self.ignore {
            if ignore.is_match(&filename) {
                debug!(%filename, "ignoring event");
                return;
            }
        }

        let relpath = join_relative(&dir, &filename);
        let abspath = self.abs_path(&relpath);

        if action == EventAction::Deleted {
            self.entries
                .retain(|key, _| !is_same_or_descendant(key, &relpath));
            if !relpath.is_empty() {
                self.directories
                    .retain(|key| !is_same_or_descendant(key, &relpath));
            }
            debug!(path = %relpath, "removed deleted path from cache");
            return;
        }

        if self.fs.is_dir(&abspath) {
            self.handle_directory_event(&relpath, &abspath, event);
        } else if self.patterns.is_match(&filename) {
            match action {
                EventAction::Exists | EventAction::Created => self.add_entry(&relpath, action),
                EventAction::Changed => {
                    if !self.entries.contains_key(&relpath) {
                        warn!(path = ?abspath, "got changed event for unexpected file");
                    }
                    self.add_entry(&relpath, action);
                }
                _ => warn!(
                    handle = %event.handle,
                    %action,
                    path = ?abspath,
                    "got unknown file event"
                ),
            }
        } else {
            warn!(%filename, "could not process filename; ignoring");
        }
    }

    fn handle_directory_event(&mut self, relpath: &str, abspath: &Path, event: &FileEvent) {
        let result = match event.action {
            EventAction::Exists | EventAction::Created => self.add_directory_monitor(relpath),
            EventAction::Changed => {
                if self.directories.contains(relpath) {
                    warn!(
                        path = ?abspath,
                        "directory properties changed; consider restarting the server"
                    );
                    Ok(())
                } else {
                    warn!(path = ?abspath, "got changed event for unexpected directory");
                    self.add_directory_monitor(relpath)
                }
            }
            other => {
                warn!(handle = %event.handle, action = %other, path = ?abspath, "got unknown dir event");
                Ok(())
            }
        };
        if let Err(err) = result {
            error!(path = ?abspath, error = %err, "failed to watch directory");
        }
    }

    /// Events for files an entry pulled in on its own (e.g. inclusions)
    /// reload that entry.
    fn handle_auxiliary_event(&mut self, event: &FileEvent) {
        let fs = Arc::clone(&self.fs);
        let owner = self
            .entries
            .iter_mut()
            .find(|(_, entry)| entry.index().watches(event.handle));
        match owner {
            Some((relative, entry)) => {
                if matches!(event.action, EventAction::EndExist | EventAction::Exists) {
                    return;
                }
                debug!(path = %relative, filename = %event.filename, "auxiliary file changed; reloading");
                if let Err(err) = entry.reload(fs.as_ref()) {
                    error!(path = %relative, error = %err, "failed to reload file");
                }
            }
            None => warn!(
                action = %event.action,
                handle = %event.handle,
                filename = %event.filename,
                "got event with unknown handle"
            ),
        }
    }
}
