// src/cache/xml.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::cache::FileIndex;
use crate::errors::{Result, SpoolError};
use crate::fs::FileSystem;
use crate::types::WatchHandle;
use crate::watch::FileMonitor;
use crate::xml::{parse_element, Element, XINCLUDE_NAMESPACE};

/// XML index for a [`FileCache`](crate::cache::FileCache).
///
/// On every load the document is parsed, its inclusion directives are
/// followed recursively, and the merged tree replaces the previous one.
/// Files pulled in that way are recorded in [`XmlDocument::extras`] and,
/// when the document was built with a monitor, watched so that touching
/// them reloads this document.
#[derive(Debug)]
pub struct XmlDocument {
    path: PathBuf,
    root: Option<Element>,
    extras: Vec<PathBuf>,
    identifier: Option<String>,
    label: Option<String>,
    monitor: Option<Arc<dyn FileMonitor>>,
    handles: BTreeMap<PathBuf, WatchHandle>,
}

impl XmlDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: None,
            extras: Vec::new(),
            identifier: None,
            label: None,
            monitor: None,
            handles: BTreeMap::new(),
        }
    }

    /// Require the root element to carry `attr`; its value becomes the label.
    pub fn with_identifier(mut self, attr: impl Into<String>) -> Self {
        self.identifier = Some(attr.into());
        self
    }

    /// Watch included files through `monitor`.
    pub fn monitored(mut self, monitor: Arc<dyn FileMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merged root element; `None` until a load succeeds.
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Top-level children of the root element.
    pub fn entries(&self) -> &[Element] {
        self.root.as_ref().map(|r| r.children.as_slice()).unwrap_or(&[])
    }

    /// Files merged in through inclusion, in discovery order.
    pub fn extras(&self) -> &[PathBuf] {
        &self.extras
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Parse `data` as this document's new contents.
    pub fn load(&mut self, data: &str, fs: &dyn FileSystem) -> Result<()> {
        self.root = None;
        self.label = None;

        let mut root = parse_element(data, &self.path).inspect_err(|err| {
            error!(path = ?self.path, error = %err, "failed to parse document");
        })?;

        let mut resolver = IncludeResolver {
            document: &self.path,
            fs,
            stack: vec![self.path.clone()],
            extras: Vec::new(),
        };
        resolver.resolve(&mut root, &self.path);
        self.extras = resolver.extras;

        if let Some(identifier) = &self.identifier {
            match root.get(identifier) {
                Some(label) => self.label = Some(label.to_string()),
                None => {
                    let message = format!("root element has no '{identifier}' attribute");
                    error!(path = ?self.path, %message, "failed to load document");
                    return Err(SpoolError::InitError {
                        path: self.path.display().to_string(),
                        message,
                    });
                }
            }
        }

        self.root = Some(root);
        self.watch_extras();
        Ok(())
    }

    fn watch_extras(&mut self) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        for extra in &self.extras {
            if self.handles.contains_key(extra) {
                continue;
            }
            match monitor.add_monitor(extra) {
                Ok(handle) => {
                    self.handles.insert(extra.clone(), handle);
                }
                Err(err) => warn!(path = ?extra, error = %err, "failed to watch included file"),
            }
        }
    }
}

impl FileIndex for XmlDocument {
    fn index(&mut self, path: &Path, data: &[u8], fs: &dyn FileSystem) -> Result<()> {
        let text = std::str::from_utf8(data).map_err(|err| SpoolError::InitError {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        self.load(text, fs)
    }

    fn watches(&self, handle: WatchHandle) -> bool {
        self.handles.values().any(|h| *h == handle)
    }
}

fn is_xinclude(element: &Element, local: &str) -> bool {
    element.tag == local
        && (element.namespace.is_none() || element.is_in_namespace(XINCLUDE_NAMESPACE))
}

struct IncludeResolver<'a> {
    document: &'a Path,
    fs: &'a dyn FileSystem,
    /// Files currently being expanded, to break inclusion cycles.
    stack: Vec<PathBuf>,
    extras: Vec<PathBuf>,
}

impl IncludeResolver<'_> {
    /// Replace every inclusion below `element` with what it points at.
    /// Relative hrefs resolve against `base`.
    fn resolve(&mut self, element: &mut Element, base: &Path) {
        let children = std::mem::take(&mut element.children);
        for mut child in children {
            if is_xinclude(&child, "include") {
                let expanded = self.expand(&child, base);
                element.children.extend(expanded);
            } else {
                self.resolve(&mut child, base);
                element.children.push(child);
            }
        }
    }

    fn expand(&mut self, directive: &Element, base: &Path) -> Vec<Element> {
        let Some(href) = directive.get("href") else {
            warn!(document = ?self.document, "inclusion without href; skipping");
            return Vec::new();
        };
        let fpath = if Path::new(href).is_absolute() {
            PathBuf::from(href)
        } else {
            base.parent().unwrap_or(Path::new("")).join(href)
        };

        if !self.fs.exists(&fpath) {
            let fallback = directive
                .children
                .iter()
                .find(|c| is_xinclude(c, "fallback"));
            return match fallback {
                Some(fallback) => {
                    debug!(document = ?self.document, %href, "included file does not exist, using fallback");
                    let mut holder = fallback.clone();
                    self.resolve(&mut holder, base);
                    holder.children
                }
                None => {
                    warn!(document = ?self.document, %href, "included file does not exist, skipping");
                    Vec::new()
                }
            };
        }

        if self.stack.contains(&fpath) {
            warn!(document = ?self.document, path = ?fpath, "recursive inclusion; skipping");
            return Vec::new();
        }

        let data = match self.fs.read_to_string(&fpath) {
            Ok(data) => data,
            Err(err) => {
                error!(document = ?self.document, path = ?fpath, error = %err, "failed to read included file");
                return Vec::new();
            }
        };
        let mut included = match parse_element(&data, &fpath) {
            Ok(root) => root,
            Err(err) => {
                error!(document = ?self.document, error = %err, "inclusion failed");
                return Vec::new();
            }
        };

        self.stack.push(fpath.clone());
        self.resolve(&mut included, &fpath);
        self.stack.pop();

        if !self.extras.contains(&fpath) {
            self.extras.push(fpath);
        }
        vec![included]
    }
}
