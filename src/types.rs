// src/types.rs

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Immutable snapshot of what the metadata subsystem knows about a client.
///
/// Every resolution call receives one of these; caches compare the whole
/// value so a result computed for one client is never served to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientMetadata {
    pub hostname: String,
    pub groups: BTreeSet<String>,
    pub version: Option<Vec<u32>>,
}

impl ClientMetadata {
    pub fn new<H, I, G>(hostname: H, groups: I) -> Self
    where
        H: Into<String>,
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        Self {
            hostname: hostname.into(),
            groups: groups.into_iter().map(Into::into).collect(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: Vec<u32>) -> Self {
        self.version = Some(version);
        self
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Action carried by a filesystem notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// The path existed when the watch was registered.
    Exists,
    Created,
    Changed,
    Deleted,
    /// End of the initial batch of `Exists` events; never mutates state.
    EndExist,
    Unknown,
}

impl EventAction {
    /// `Exists` or `Created`.
    pub fn is_creation(self) -> bool {
        matches!(self, EventAction::Exists | EventAction::Created)
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventAction::Exists => "exists",
            EventAction::Created => "created",
            EventAction::Changed => "changed",
            EventAction::Deleted => "deleted",
            EventAction::EndExist => "endExist",
            EventAction::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for EventAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "exists" => Ok(EventAction::Exists),
            "created" => Ok(EventAction::Created),
            "changed" => Ok(EventAction::Changed),
            "deleted" => Ok(EventAction::Deleted),
            "endExist" | "end-of-existing-batch" => Ok(EventAction::EndExist),
            other => Err(format!("invalid event action: {other}")),
        }
    }
}

/// Identifier returned by a monitor when a path is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(pub u64);

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One notification from the file monitor.
///
/// `filename` is relative to the directory registered under `handle`,
/// except for the very first event of a registration, which names the
/// watched path itself (absolute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub handle: WatchHandle,
    pub filename: String,
    pub action: EventAction,
}

impl FileEvent {
    pub fn new(handle: WatchHandle, filename: impl Into<String>, action: EventAction) -> Self {
        Self {
            handle,
            filename: filename.into(),
            action,
        }
    }
}
