// src/priority/source.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error};

use crate::cache::{FileIndex, XmlDocument};
use crate::errors::{Result, SpoolError};
use crate::fs::FileSystem;
use crate::predicate::{ItemKey, MatchSet, PredicateTree, TreeKind};
use crate::types::{ClientMetadata, WatchHandle};
use crate::watch::FileMonitor;
use crate::xml::Element;

#[derive(Debug)]
struct CachedMatch {
    metadata: ClientMetadata,
    matches: Arc<MatchSet>,
}

/// One prioritized XML source document.
///
/// The root element carries `priority="<int>"`; below it, Group/Client
/// containers gate leaf items. Loading rebuilds the predicate tree and
/// drops the per-client cache.
#[derive(Debug)]
pub struct PrioritySource {
    document: XmlDocument,
    kind: TreeKind,
    priority_required: bool,
    tree: Option<PredicateTree>,
    priority: Option<i64>,
    cache: Mutex<Option<CachedMatch>>,
}

impl PrioritySource {
    /// Standard source: Group/Client containers, priority required.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, TreeKind::Standard, true)
    }

    /// Per-path metadata source (`info.xml`): Path containers allowed,
    /// priority optional.
    pub fn info(path: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, TreeKind::PathAware, false)
    }

    pub fn with_kind(path: impl Into<PathBuf>, kind: TreeKind, priority_required: bool) -> Self {
        Self {
            document: XmlDocument::new(path),
            kind,
            priority_required,
            tree: None,
            priority: None,
            cache: Mutex::new(None),
        }
    }

    /// Watch included files so touching them reloads this source.
    pub fn monitored(mut self, monitor: Arc<dyn FileMonitor>) -> Self {
        self.document = self.document.monitored(monitor);
        self
    }

    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// Files merged in through inclusion.
    pub fn extras(&self) -> &[PathBuf] {
        self.document.extras()
    }

    pub fn priority(&self) -> Option<i64> {
        self.priority
    }

    /// `None` while the document is not loadable.
    pub fn tree(&self) -> Option<&PredicateTree> {
        self.tree.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.tree.is_some()
    }

    /// Every (tag, name) this source mentions, regardless of predicates.
    pub fn items(&self) -> Option<&BTreeMap<String, Vec<ItemKey>>> {
        self.tree.as_ref().map(PredicateTree::items)
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<CachedMatch>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&mut self, data: &str, fs: &dyn FileSystem) -> Result<()> {
        self.tree = None;
        self.priority = None;
        *self.lock_cache() = None;

        self.document.load(data, fs)?;
        let Some(root) = self.document.root() else {
            return Ok(());
        };

        let priority = root.get("priority").and_then(|p| p.trim().parse::<i64>().ok());
        if priority.is_none() && self.priority_required {
            let message = format!("got bogus priority {:?}", root.get("priority"));
            error!(path = ?self.path(), %message, "failed to load source");
            return Err(SpoolError::InitError {
                path: self.path().display().to_string(),
                message,
            });
        }

        let tree = PredicateTree::build(root, self.kind).inspect_err(|err| {
            error!(path = ?self.path(), error = %err, "failed to compile source");
        })?;
        debug!(path = ?self.path(), ?priority, nodes = tree.len(), "source loaded");
        self.tree = Some(tree);
        self.priority = priority;
        Ok(())
    }

    /// Items applying to `metadata`, cached until a different client asks
    /// or the document reloads. `None` if the document is not loaded.
    pub fn cached_match(&self, metadata: &ClientMetadata) -> Option<Arc<MatchSet>> {
        let tree = self.tree.as_ref()?;
        let mut cache = self.lock_cache();
        if let Some(cached) = cache.as_ref() {
            if cached.metadata == *metadata {
                return Some(Arc::clone(&cached.matches));
            }
        }
        let matches = Arc::new(tree.evaluate(metadata, None));
        *cache = Some(CachedMatch {
            metadata: metadata.clone(),
            matches: Arc::clone(&matches),
        });
        Some(matches)
    }

    /// Uncached evaluation against a concrete target entry (`Path` tests).
    pub fn match_entry(&self, metadata: &ClientMetadata, entry: &Element) -> Option<MatchSet> {
        self.tree
            .as_ref()
            .map(|tree| tree.evaluate(metadata, Some(entry)))
    }
}

impl FileIndex for PrioritySource {
    fn index(&mut self, path: &Path, data: &[u8], fs: &dyn FileSystem) -> Result<()> {
        let text = std::str::from_utf8(data).map_err(|err| SpoolError::InitError {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        self.load(text, fs)
    }

    fn watches(&self, handle: WatchHandle) -> bool {
        self.document.watches(handle)
    }
}
