// src/cache/file.rs

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::cache::FileIndex;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::EventAction;

/// In-memory mirror of one file plus whatever `T` derives from it.
#[derive(Debug)]
pub struct FileCache<T> {
    path: PathBuf,
    /// Root of the directory cache this file belongs to.
    owner: PathBuf,
    data: Vec<u8>,
    index: T,
    load_error: Option<String>,
}

impl<T: FileIndex> FileCache<T> {
    pub fn new(path: impl Into<PathBuf>, owner: impl Into<PathBuf>, index: T) -> Self {
        Self {
            path: path.into(),
            owner: owner.into(),
            data: Vec::new(),
            index,
            load_error: None,
        }
    }

    /// Reload on `exists` / `created` / `changed`; ignore everything else.
    pub fn handle_event(&mut self, action: EventAction, fs: &dyn FileSystem) -> Result<()> {
        match action {
            EventAction::Exists | EventAction::Created | EventAction::Changed => self.reload(fs),
            _ => Ok(()),
        }
    }

    /// Re-read the file and rebuild the index.
    ///
    /// A read failure is logged and leaves the previous contents in place.
    /// An index failure is returned and remembered in [`Self::load_error`].
    pub fn reload(&mut self, fs: &dyn FileSystem) -> Result<()> {
        let data = match fs.read(&self.path) {
            Ok(data) => data,
            Err(err) => {
                error!(path = ?self.path, error = %err, "failed to read file");
                return Ok(());
            }
        };
        debug!(path = ?self.path, bytes = data.len(), "file loaded");
        self.data = data;

        match self.index.index(&self.path, &self.data, fs) {
            Ok(()) => {
                self.load_error = None;
                Ok(())
            }
            Err(err) => {
                self.load_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> &Path {
        &self.owner
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn index(&self) -> &T {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut T {
        &mut self.index
    }

    /// Message of the last failed index build, if the file is currently
    /// unusable.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }
}
