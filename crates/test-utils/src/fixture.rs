#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use groupspool::engine::Engine;
use groupspool::fs::FileSystem;
use groupspool::fs::mock::MockFileSystem;
use groupspool::types::{EventAction, FileEvent, WatchHandle};
use groupspool::watch::{FileMonitor, MockMonitor};

/// In-memory repository plus a recording monitor.
///
/// Paths passed to the helpers are relative to the repository root.
pub struct RepoFixture {
    root: PathBuf,
    pub fs: MockFileSystem,
    pub monitor: Arc<MockMonitor>,
}

impl RepoFixture {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let fs = MockFileSystem::new();
        fs.add_dir(&root);
        Self {
            root,
            fs,
            monitor: Arc::new(MockMonitor::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        let relative = relative.trim_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    pub fn fs(&self) -> Arc<dyn FileSystem> {
        Arc::new(self.fs.clone())
    }

    pub fn monitor(&self) -> Arc<dyn FileMonitor> {
        self.monitor.clone()
    }

    pub fn write(&self, relative: &str, content: impl Into<Vec<u8>>) {
        self.fs.add_file(self.path(relative), content);
    }

    pub fn mkdir(&self, relative: &str) {
        self.fs.add_dir(self.path(relative));
    }

    pub fn remove(&self, relative: &str) {
        self.fs.remove(self.path(relative));
    }

    /// Latest handle registered for the directory (or file) `relative`.
    pub fn handle(&self, relative: &str) -> WatchHandle {
        self.monitor
            .handle_for(self.path(relative))
            .unwrap_or_else(|| panic!("no watch registered for {relative:?}"))
    }

    pub fn registrations(&self, relative: &str) -> usize {
        self.monitor.count_for(self.path(relative))
    }

    /// Event for `filename` inside the watched directory `dir`.
    pub fn event(&self, dir: &str, filename: &str, action: EventAction) -> FileEvent {
        FileEvent::new(self.handle(dir), filename, action)
    }

    /// The initial `exists` batch for the watched directory `dir`.
    pub fn existing(&self, dir: &str) -> Vec<FileEvent> {
        self.monitor.existing_events(self.path(dir), &self.fs)
    }

    /// Feed the initial batch of `dir` into `engine`, recursing into every
    /// directory registered along the way, the way a real monitor would.
    pub fn load(&self, engine: &Engine, dir: &str) {
        let mut pending: Vec<PathBuf> = vec![self.path(dir)];
        let mut seen = self.monitor.registrations().len();
        while let Some(path) = pending.pop() {
            for event in self.monitor.existing_events(&path, &self.fs) {
                engine.handle_event(&event);
            }
            let registrations = self.monitor.registrations();
            for (_, new_path) in &registrations[seen..] {
                pending.push(new_path.clone());
            }
            seen = registrations.len();
        }
    }
}
