// src/watch/mod.rs

//! File monitoring.
//!
//! Caches register the directories (and auxiliary files) they care about
//! with a [`FileMonitor`] and get a [`WatchHandle`] back. The monitor later
//! delivers [`FileEvent`](crate::types::FileEvent)s tagged with that handle
//! on a single ordered stream; routing events to the cache owning a handle
//! is the engine's job.
//!
//! Two implementations exist:
//! - [`NotifyMonitor`]: backed by `notify`, used by the binary.
//! - [`MockMonitor`]: records registrations only; tests feed events by hand.

use std::fmt::Debug;
use std::path::Path;

use anyhow::Result;

use crate::types::WatchHandle;

pub mod mock;
pub mod path_utils;
pub mod watcher;

pub use mock::MockMonitor;
pub use path_utils::relative_str;
pub use watcher::NotifyMonitor;

/// Registration side of a file-alteration monitor.
pub trait FileMonitor: Send + Sync + Debug {
    /// Start watching `path` (a directory or a single file).
    ///
    /// Implementations announce existing contents as `Exists` events followed
    /// by one `EndExist`. Handles stay valid for the lifetime of the monitor,
    /// even if the watched path is deleted and later recreated.
    fn add_monitor(&self, path: &Path) -> Result<WatchHandle>;
}
