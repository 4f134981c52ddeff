// src/watch/mock.rs

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;

use super::FileMonitor;
use crate::fs::FileSystem;
use crate::types::{EventAction, FileEvent, WatchHandle};

/// Monitor that only records registrations.
///
/// Handles are handed out sequentially starting at 1. Tests look them up
/// with [`MockMonitor::handle_for`] and build events themselves, or use
/// [`MockMonitor::existing_events`] to simulate the initial batch.
#[derive(Debug, Default)]
pub struct MockMonitor {
    registrations: Mutex<Vec<(WatchHandle, PathBuf)>>,
}

impl MockMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All registrations in order.
    pub fn registrations(&self) -> Vec<(WatchHandle, PathBuf)> {
        self.registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Most recent handle registered for `path`.
    pub fn handle_for(&self, path: impl AsRef<Path>) -> Option<WatchHandle> {
        let path = path.as_ref();
        self.registrations()
            .into_iter()
            .rev()
            .find(|(_, p)| p == path)
            .map(|(h, _)| h)
    }

    /// Number of times `path` was registered.
    pub fn count_for(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.registrations()
            .iter()
            .filter(|(_, p)| p == path)
            .count()
    }

    /// The events a real monitor would emit right after registering `path`:
    /// the path itself, one `Exists` per child, then `EndExist`.
    pub fn existing_events(&self, path: impl AsRef<Path>, fs: &dyn FileSystem) -> Vec<FileEvent> {
        let path = path.as_ref();
        let Some(handle) = self.handle_for(path) else {
            return Vec::new();
        };
        let mut events = vec![FileEvent::new(
            handle,
            path.to_string_lossy(),
            EventAction::Exists,
        )];
        if fs.is_dir(path) {
            for child in fs.read_dir(path).unwrap_or_default() {
                if let Some(name) = child.file_name() {
                    events.push(FileEvent::new(
                        handle,
                        name.to_string_lossy(),
                        EventAction::Exists,
                    ));
                }
            }
        }
        events.push(FileEvent::new(handle, path.to_string_lossy(), EventAction::EndExist));
        events
    }
}

impl FileMonitor for MockMonitor {
    fn add_monitor(&self, path: &Path) -> Result<WatchHandle> {
        let mut regs = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
        let handle = WatchHandle(regs.len() as u64 + 1);
        regs.push((handle, path.to_path_buf()));
        Ok(handle)
    }
}
