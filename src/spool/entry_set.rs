// src/spool/entry_set.rs

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::cache::FileCache;
use crate::errors::{Result, SpoolError};
use crate::fs::FileSystem;
use crate::priority::PrioritySource;
use crate::spool::info::{FileMetadata, INFO_FILES, bind_info, parse_info};
use crate::spool::specificity::{Specificity, SpecificityPattern};
use crate::types::{ClientMetadata, EventAction};
use crate::xml::Element;

/// Editor droppings and template fragments that never count as variants.
pub const IGNORE_PATTERN: &str = r"^(\.#.*|.*~|\..*\.(sw[px])|.*\.genshi_include)$";

/// One physical variant of a logical file.
pub trait SpecificData: Debug + Send + Sync + Sized {
    fn new(path: PathBuf, specific: Specificity, encoding: &str) -> Self;

    fn path(&self) -> &Path;

    fn specific(&self) -> &Specificity;

    /// Re-read on anything but `deleted`.
    fn handle_event(&mut self, action: EventAction, fs: &dyn FileSystem);

    /// Fill the entry's content from this variant.
    fn bind_entry(&self, entry: &mut Element, metadata: &ClientMetadata) -> Result<()>;
}

/// Variant whose content is bound verbatim.
#[derive(Debug, Clone)]
pub struct SpecificFile {
    path: PathBuf,
    specific: Specificity,
    encoding: String,
    data: Option<Vec<u8>>,
}

impl SpecificFile {
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

impl SpecificData for SpecificFile {
    fn new(path: PathBuf, specific: Specificity, encoding: &str) -> Self {
        Self {
            path,
            specific,
            encoding: encoding.to_string(),
            data: None,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn specific(&self) -> &Specificity {
        &self.specific
    }

    fn handle_event(&mut self, action: EventAction, fs: &dyn FileSystem) {
        if action == EventAction::Deleted {
            return;
        }
        match fs.read(&self.path) {
            Ok(data) => self.data = Some(data),
            Err(err) => error!(path = ?self.path, error = %err, "failed to read file"),
        }
    }

    fn bind_entry(&self, entry: &mut Element, _metadata: &ClientMetadata) -> Result<()> {
        let Some(data) = &self.data else {
            return Err(SpoolError::BindingError(format!(
                "{} has not been read",
                self.path.display()
            )));
        };
        match std::str::from_utf8(data) {
            Ok(text) => {
                entry.text = Some(text.to_string());
            }
            Err(_) => {
                debug!(path = ?self.path, encoding = %self.encoding, "binding binary content");
                entry.set("encoding", "base64");
                entry.text = Some(STANDARD.encode(data));
            }
        }
        Ok(())
    }
}

/// All variants of one logical path plus its metadata overlay.
#[derive(Debug)]
pub struct EntrySet<T: SpecificData> {
    basename: String,
    path: PathBuf,
    entry_type: String,
    encoding: String,
    entries: BTreeMap<String, T>,
    defaults: FileMetadata,
    metadata: FileMetadata,
    infoxml: Option<FileCache<PrioritySource>>,
    specific: SpecificityPattern,
    ignore: Regex,
}

impl<T: SpecificData> EntrySet<T> {
    /// `path` is the directory holding the variants of `basename`.
    pub fn new(
        basename: impl Into<String>,
        path: impl Into<PathBuf>,
        entry_type: impl Into<String>,
        encoding: impl Into<String>,
        defaults: FileMetadata,
    ) -> Result<Self> {
        let basename = basename.into();
        let specific = SpecificityPattern::new(&basename, false)?;
        let ignore = Regex::new(IGNORE_PATTERN).map_err(anyhow::Error::from)?;
        Ok(Self {
            basename,
            path: path.into(),
            entry_type: entry_type.into(),
            encoding: encoding.into(),
            entries: BTreeMap::new(),
            metadata: defaults.clone(),
            defaults,
            infoxml: None,
            specific,
            ignore,
        })
    }

    pub fn with_pattern(mut self, specific: SpecificityPattern) -> Self {
        self.specific = specific;
        self
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn entries(&self) -> &BTreeMap<String, T> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Effective `info` metadata (defaults patched by the sidecar, if any).
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn infoxml(&self) -> Option<&PrioritySource> {
        self.infoxml.as_ref().map(FileCache::index)
    }

    pub fn specificity_from_filename(&self, fname: &str) -> Result<Specificity> {
        self.specific.parse(fname)
    }

    pub fn get_matching(&self, metadata: &ClientMetadata) -> Vec<&T> {
        self.entries
            .values()
            .filter(|item| item.specific().matches(metadata))
            .collect()
    }

    /// The most specific variant for this client.
    ///
    /// Fails when nothing matches, or when the two most specific matches are
    /// group variants sharing one priority. A plain variant outranks a delta
    /// variant of the same specificity, and the two never conflict.
    pub fn best_matching(&self, metadata: &ClientMetadata) -> Result<&T> {
        let mut matching = self.get_matching(metadata);
        matching.sort_by(|a, b| rank(a.specific(), b.specific()));

        let Some(best) = matching.last().copied() else {
            return Err(SpoolError::NoMatchingEntry {
                path: self.path.display().to_string(),
                hostname: metadata.hostname.clone(),
            });
        };

        if best.specific().is_group() {
            let tied: Vec<&T> = matching
                .iter()
                .copied()
                .filter(|item| rank(item.specific(), best.specific()).is_eq())
                .collect();
            if tied.len() > 1 {
                let candidates: Vec<String> = tied
                    .iter()
                    .map(|item| item.path().display().to_string())
                    .collect();
                error!(
                    path = ?self.path,
                    host = %metadata.hostname,
                    ?candidates,
                    "conflicting group-specific entries with same priority"
                );
                return Err(SpoolError::SpecificityConflict {
                    path: self.path.display().to_string(),
                    hostname: metadata.hostname.clone(),
                    candidates,
                });
            }
        }
        Ok(best)
    }

    /// Apply one notification whose filename is relative to [`Self::path`].
    pub fn handle_event(&mut self, filename: &str, action: EventAction, fs: &dyn FileSystem) {
        if INFO_FILES.contains(&filename) {
            match action {
                EventAction::Exists | EventAction::Created | EventAction::Changed => {
                    self.update_metadata(filename, action, fs)
                }
                EventAction::Deleted => self.reset_metadata(filename),
                _ => {}
            }
            return;
        }

        if action.is_creation() {
            self.entry_init(filename, action, fs);
            return;
        }

        if !self.entries.contains_key(filename) {
            warn!(%action, %filename, path = ?self.path, "got event for unknown file");
            if action == EventAction::Changed {
                self.entry_init(filename, action, fs);
            }
            return;
        }

        match action {
            EventAction::Changed => {
                if let Some(entry) = self.entries.get_mut(filename) {
                    entry.handle_event(action, fs);
                }
            }
            EventAction::Deleted => {
                self.entries.remove(filename);
                debug!(%filename, path = ?self.path, "removed variant");
            }
            _ => {}
        }
    }

    /// Track a new variant and load it.
    pub fn entry_init(&mut self, filename: &str, action: EventAction, fs: &dyn FileSystem) {
        if self.entries.contains_key(filename) {
            warn!(%filename, path = ?self.path, "got duplicate add");
        } else {
            let fpath = self.path.join(filename);
            let spec = match self.specificity_from_filename(filename) {
                Ok(spec) => spec,
                Err(_) if self.ignore.is_match(filename) => {
                    debug!(path = ?fpath, "ignoring file");
                    return;
                }
                Err(_) => {
                    error!(path = ?fpath, "could not process filename; ignoring");
                    return;
                }
            };
            debug!(path = ?fpath, specificity = %spec, "new variant");
            self.entries
                .insert(filename.to_string(), T::new(fpath, spec, &self.encoding));
        }
        if let Some(entry) = self.entries.get_mut(filename) {
            entry.handle_event(action, fs);
        }
    }

    /// Load `info` (flat patch over the defaults) or `info.xml` (predicate
    /// document consulted at bind time).
    pub fn update_metadata(&mut self, filename: &str, action: EventAction, fs: &dyn FileSystem) {
        let fpath = self.path.join(filename);
        if filename == "info.xml" {
            let infoxml = self.infoxml.get_or_insert_with(|| {
                FileCache::new(&fpath, &self.path, PrioritySource::info(&fpath))
            });
            if let Err(err) = infoxml.handle_event(action, fs) {
                error!(path = ?fpath, error = %err, "failed to load info.xml");
            }
            return;
        }

        match fs.read_to_string(&fpath) {
            Ok(text) => {
                let patch = parse_info(&text);
                self.metadata = self.defaults.patched(&patch);
                debug!(path = ?fpath, metadata = ?self.metadata, "info loaded");
            }
            Err(err) => error!(path = ?fpath, error = %err, "failed to read info file"),
        }
    }

    /// Forget a deleted sidecar.
    pub fn reset_metadata(&mut self, filename: &str) {
        if filename == "info.xml" {
            self.infoxml = None;
        } else {
            self.metadata = self.defaults.clone();
        }
    }

    pub fn bind_info_to_entry(&self, entry: &mut Element, metadata: &ClientMetadata) -> Result<()> {
        bind_info(entry, metadata, self.infoxml(), &self.metadata)
    }

    /// Bind metadata, then content from the best variant.
    pub fn bind_entry(&self, entry: &mut Element, metadata: &ClientMetadata) -> Result<()> {
        self.bind_info_to_entry(entry, metadata)?;
        self.best_matching(metadata)?.bind_entry(entry, metadata)
    }
}

/// Specificity first, then plain over delta.
fn rank(a: &Specificity, b: &Specificity) -> Ordering {
    a.precedence(b)
        .then_with(|| b.delta.is_some().cmp(&a.delta.is_some()))
}
