// src/watch/watcher.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard, Weak};

use anyhow::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::FileMonitor;
use crate::fs::FileSystem;
use crate::types::{EventAction, FileEvent, WatchHandle};

#[derive(Debug, Default)]
struct Registry {
    next: u64,
    dirs: HashMap<PathBuf, WatchHandle>,
    files: HashMap<PathBuf, WatchHandle>,
}

impl Registry {
    /// Every (handle, filename) pair covering an absolute path reported by
    /// `notify`: the file's own watch and its parent directory's watch.
    fn route(&self, path: &Path) -> Vec<(WatchHandle, String)> {
        let mut routes = Vec::new();
        if let Some(handle) = self.files.get(path) {
            routes.push((*handle, path.to_string_lossy().into_owned()));
        }
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(handle) = self.dirs.get(parent) {
                routes.push((*handle, name.to_string_lossy().into_owned()));
            }
        }
        routes
    }
}

/// `notify`-backed [`FileMonitor`].
///
/// Every registered directory is watched non-recursively; nested
/// directories are registered by the caches themselves as they discover
/// them. Events are pushed onto an unbounded channel in delivery order.
///
/// A watched directory that is deleted and recreated keeps its handle: the
/// recreation is noticed through the parent's watch and the directory is
/// re-armed on a helper thread, which then announces its contents.
pub struct NotifyMonitor {
    watcher: Arc<Mutex<RecommendedWatcher>>,
    registry: Arc<Mutex<Registry>>,
    event_tx: mpsc::UnboundedSender<FileEvent>,
    fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for NotifyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyMonitor").finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl NotifyMonitor {
    pub fn new(
        event_tx: mpsc::UnboundedSender<FileEvent>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let (rearm_tx, rearm_rx) = std_mpsc::channel::<PathBuf>();

        // Called synchronously by notify on its own thread.
        let watcher = RecommendedWatcher::new(
            {
                let registry = Arc::clone(&registry);
                let event_tx = event_tx.clone();
                move |res: notify::Result<Event>| match res {
                    Ok(event) => {
                        let reg = lock(&registry);
                        for (path, action) in translate(&event) {
                            if action == EventAction::Created && reg.dirs.contains_key(&path) {
                                if let Err(err) = rearm_tx.send(path.clone()) {
                                    warn!(?path, "failed to queue re-arm: {err}");
                                }
                            }
                            let routes = reg.route(&path);
                            if routes.is_empty() {
                                debug!(?path, "event outside any watched directory");
                            }
                            for (handle, filename) in routes {
                                send(&event_tx, FileEvent::new(handle, filename, action));
                            }
                        }
                    }
                    Err(err) => warn!("file watch error: {err}"),
                }
            },
            Config::default(),
        )?;
        let watcher = Arc::new(Mutex::new(watcher));

        spawn_rearm_thread(
            Arc::downgrade(&watcher),
            rearm_rx,
            Arc::clone(&registry),
            event_tx.clone(),
            Arc::clone(&fs),
        );

        Ok(Self {
            watcher,
            registry,
            event_tx,
            fs,
        })
    }
}

impl FileMonitor for NotifyMonitor {
    fn add_monitor(&self, path: &Path) -> Result<WatchHandle> {
        let is_dir = self.fs.is_dir(path);
        let handle = {
            let mut reg = lock(&self.registry);
            let existing = if is_dir {
                reg.dirs.get(path).copied()
            } else {
                reg.files.get(path).copied()
            };
            match existing {
                Some(handle) => handle,
                None => {
                    reg.next += 1;
                    let handle = WatchHandle(reg.next);
                    if is_dir {
                        reg.dirs.insert(path.to_path_buf(), handle);
                    } else {
                        reg.files.insert(path.to_path_buf(), handle);
                    }
                    handle
                }
            }
        };

        lock(&self.watcher).watch(path, RecursiveMode::NonRecursive)?;
        info!(%handle, ?path, "monitor added");

        announce(handle, path, is_dir, self.fs.as_ref(), &self.event_tx, true);
        Ok(handle)
    }
}

/// Queue the initial batch for a freshly (re-)armed watch.
fn announce(
    handle: WatchHandle,
    path: &Path,
    is_dir: bool,
    fs: &dyn FileSystem,
    event_tx: &mpsc::UnboundedSender<FileEvent>,
    include_self: bool,
) {
    let abs = path.to_string_lossy().into_owned();
    if include_self {
        send(event_tx, FileEvent::new(handle, abs.clone(), EventAction::Exists));
    }
    if is_dir {
        match fs.read_dir(path) {
            Ok(children) => {
                for child in children {
                    if let Some(name) = child.file_name() {
                        send(
                            event_tx,
                            FileEvent::new(handle, name.to_string_lossy(), EventAction::Exists),
                        );
                    }
                }
            }
            Err(err) => warn!(?path, error = %err, "failed to list watched directory"),
        }
    }
    send(event_tx, FileEvent::new(handle, abs, EventAction::EndExist));
}

fn send(event_tx: &mpsc::UnboundedSender<FileEvent>, event: FileEvent) {
    if let Err(err) = event_tx.send(event) {
        warn!("failed to forward file event: {err}");
    }
}

fn spawn_rearm_thread(
    watcher: Weak<Mutex<RecommendedWatcher>>,
    rearm_rx: std_mpsc::Receiver<PathBuf>,
    registry: Arc<Mutex<Registry>>,
    event_tx: mpsc::UnboundedSender<FileEvent>,
    fs: Arc<dyn FileSystem>,
) {
    std::thread::spawn(move || {
        while let Ok(path) = rearm_rx.recv() {
            let Some(watcher) = watcher.upgrade() else {
                break;
            };
            let Some(handle) = lock(&registry).dirs.get(&path).copied() else {
                continue;
            };
            if let Err(err) = lock(&watcher).watch(&path, RecursiveMode::NonRecursive) {
                warn!(?path, error = %err, "failed to re-arm watch on recreated directory");
                continue;
            }
            debug!(%handle, ?path, "re-armed watch on recreated directory");
            announce(handle, &path, true, fs.as_ref(), &event_tx, false);
        }
        debug!("re-arm thread finished");
    });
}

/// Flatten a notify event into (path, action) pairs.
fn translate(event: &Event) -> Vec<(PathBuf, EventAction)> {
    let action = match event.kind {
        EventKind::Create(_) => EventAction::Created,
        EventKind::Remove(_) => EventAction::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => EventAction::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => EventAction::Created,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push((from.clone(), EventAction::Deleted));
            }
            if let Some(to) = event.paths.get(1) {
                out.push((to.clone(), EventAction::Created));
            }
            return out;
        }
        EventKind::Modify(_) => EventAction::Changed,
        _ => return Vec::new(),
    };
    event.paths.iter().map(|p| (p.clone(), action)).collect()
}
