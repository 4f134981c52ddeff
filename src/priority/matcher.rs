// src/priority/matcher.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::cache::{ChildFactory, DirectoryCache};
use crate::errors::{Result, SpoolError};
use crate::fs::FileSystem;
use crate::predicate::{ItemData, ItemKey, MatchSet};
use crate::priority::PrioritySource;
use crate::types::{ClientMetadata, FileEvent, WatchHandle};
use crate::watch::FileMonitor;
use crate::xml::Element;

/// How item names in source documents are compared with entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMatch {
    /// Names must be equal.
    #[default]
    Exact,
    /// Names are anchored regular expressions; exact names still win.
    Pattern,
}

/// Directory of [`PrioritySource`] documents resolving entries by priority.
///
/// Every `*.xml` file below the root is a source. For an entry, the sources
/// whose matching items include the entry's tag and name compete; the
/// highest `priority` wins and a tie at the top is an error.
#[derive(Debug)]
pub struct PriorityMatcher {
    name: String,
    sources: DirectoryCache<PrioritySource>,
    names: NameMatch,
    /// tag → names mentioned by any loaded source.
    dispatch: BTreeMap<String, BTreeSet<ItemKey>>,
    /// Compiled name patterns, `pattern` mode only.
    patterns: HashMap<String, Regex>,
}

impl PriorityMatcher {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        monitor: Arc<dyn FileMonitor>,
    ) -> Result<Self> {
        let patterns = Regex::new(r"^.*\.xml$").map_err(anyhow::Error::from)?;
        let factory: ChildFactory<PrioritySource> = {
            let monitor = Arc::clone(&monitor);
            Box::new(move |path| PrioritySource::new(path).monitored(Arc::clone(&monitor)))
        };
        Ok(Self {
            name: name.into(),
            sources: DirectoryCache::new(root, fs, monitor, patterns, factory)?,
            names: NameMatch::Exact,
            dispatch: BTreeMap::new(),
            patterns: HashMap::new(),
        })
    }

    pub fn with_name_match(mut self, names: NameMatch) -> Self {
        self.names = names;
        self.rebuild_dispatch();
        self
    }

    pub fn with_ignore(mut self, ignore: Option<Regex>) -> Self {
        self.sources = self.sources.with_ignore(ignore);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &DirectoryCache<PrioritySource> {
        &self.sources
    }

    pub fn owns(&self, handle: WatchHandle) -> bool {
        self.sources.owns(handle)
    }

    /// Apply a notification and rebuild the dispatch table.
    pub fn handle_event(&mut self, event: &FileEvent) {
        self.sources.handle_event(event);
        self.rebuild_dispatch();
    }

    fn rebuild_dispatch(&mut self) {
        self.dispatch.clear();
        for (_, source) in self.sources.entries() {
            let Some(items) = source.index().items() else {
                continue;
            };
            for (tag, names) in items {
                self.dispatch
                    .entry(tag.clone())
                    .or_default()
                    .extend(names.iter().cloned());
            }
        }
        self.compile_patterns();
    }

    fn compile_patterns(&mut self) {
        if self.names != NameMatch::Pattern {
            self.patterns.clear();
            return;
        }
        let mut previous = std::mem::take(&mut self.patterns);
        let rules: BTreeSet<&String> = self.dispatch.values().flatten().flatten().collect();
        for rule in rules {
            if let Some(re) = previous.remove(rule) {
                self.patterns.insert(rule.clone(), re);
                continue;
            }
            match Regex::new(&format!("^(?:{rule})$")) {
                Ok(re) => {
                    self.patterns.insert(rule.clone(), re);
                }
                Err(err) => warn!(
                    matcher = %self.name,
                    pattern = %rule,
                    error = %err,
                    "invalid name pattern; only exact matches apply"
                ),
            }
        }
    }

    fn accepts(&self, entry_name: Option<&str>, rule: &ItemKey) -> bool {
        if rule.as_deref() == entry_name {
            return true;
        }
        match (rule, entry_name) {
            (Some(rule), Some(name)) => self
                .patterns
                .get(rule)
                .is_some_and(|re| re.is_match(name)),
            _ => false,
        }
    }

    /// Whether any loaded source mentions this entry at all.
    pub fn handles_entry(&self, entry: &Element) -> bool {
        self.dispatch.get(&entry.tag).is_some_and(|names| {
            names
                .iter()
                .any(|rule| self.accepts(entry.name(), rule))
        })
    }

    fn matches(&self, entry: &Element, rules: &BTreeMap<ItemKey, ItemData>) -> bool {
        rules
            .keys()
            .any(|rule| self.accepts(entry.name(), rule))
    }

    /// Pick the winning source for `entry`, copy its text and children onto
    /// the entry, and return the attributes to apply.
    pub fn get_attrs(
        &self,
        entry: &mut Element,
        metadata: &ClientMetadata,
    ) -> Result<BTreeMap<String, String>> {
        let entry_name = entry.name().unwrap_or_default().to_string();

        let mut matching: Vec<(&PrioritySource, Arc<MatchSet>)> = Vec::new();
        for (_, cache) in self.sources.entries() {
            let source = cache.index();
            let Some(matches) = source.cached_match(metadata) else {
                continue;
            };
            if matches
                .get(&entry.tag)
                .is_some_and(|rules| self.matches(entry, rules))
            {
                matching.push((source, matches));
            }
        }

        let (winner, matches) = match matching.len() {
            0 => {
                return Err(SpoolError::NoMatchingSource {
                    tag: entry.tag.clone(),
                    name: entry_name,
                });
            }
            1 => matching.swap_remove(0),
            _ => {
                let prio = |s: &PrioritySource| s.priority().unwrap_or(i64::MIN);
                let max = matching.iter().map(|(s, _)| prio(s)).max().unwrap_or(i64::MIN);
                let top: Vec<usize> = matching
                    .iter()
                    .enumerate()
                    .filter(|(_, (s, _))| prio(s) == max)
                    .map(|(i, _)| i)
                    .collect();
                if top.len() > 1 {
                    let sources: Vec<String> = top
                        .iter()
                        .map(|&i| matching[i].0.path().display().to_string())
                        .collect();
                    error!(
                        matcher = %self.name,
                        tag = %entry.tag,
                        name = %entry_name,
                        host = %metadata.hostname,
                        priority = max,
                        ?sources,
                        "conflicting sources with same priority"
                    );
                    return Err(SpoolError::PriorityConflict {
                        tag: entry.tag.clone(),
                        name: entry_name,
                        hostname: metadata.hostname.clone(),
                        priority: max,
                        sources,
                    });
                }
                matching.swap_remove(top[0])
            }
        };

        let rules = matches.get(&entry.tag).ok_or_else(|| SpoolError::NoMatchingSource {
            tag: entry.tag.clone(),
            name: entry_name.clone(),
        })?;
        let exact: ItemKey = entry.name().map(str::to_string);
        let data = rules
            .get(&exact)
            .or_else(|| {
                rules
                    .iter()
                    .find(|(rule, _)| self.accepts(entry.name(), rule))
                    .map(|(_, data)| data)
            })
            .ok_or_else(|| SpoolError::NoMatchingSource {
                tag: entry.tag.clone(),
                name: entry_name.clone(),
            })?;

        debug!(
            matcher = %self.name,
            entry = %entry,
            source = ?winner.path(),
            priority = ?winner.priority(),
            "bound entry from source"
        );

        if let Some(text) = &data.text {
            entry.text = Some(text.clone());
        }
        entry.children.extend(data.children.iter().cloned());
        Ok(data.attributes.clone())
    }

    /// Resolve and apply the winning attributes onto `entry`.
    pub fn bind_entry(
        &self,
        entry: &mut Element,
        metadata: &ClientMetadata,
    ) -> Result<BTreeMap<String, String>> {
        let attrs = self.get_attrs(entry, metadata)?;
        for (key, value) in &attrs {
            entry.set(key.clone(), value.clone());
        }
        Ok(attrs)
    }
}
