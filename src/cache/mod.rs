// src/cache/mod.rs

//! Coherent in-memory caches over the repository.
//!
//! - [`FileCache`] mirrors one file and re-derives an index (`T: FileIndex`)
//!   whenever it is told the file changed.
//! - [`DirectoryCache`] mirrors a directory subtree, creating and dropping
//!   `FileCache`s as notifications arrive.
//! - [`XmlDocument`] is the XML index: parse + inclusion resolution.
//!
//! Caches only ever mutate in response to notifications; reads never touch
//! the filesystem.

use std::fmt::Debug;
use std::path::Path;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::WatchHandle;

pub mod directory;
pub mod file;
pub mod xml;

pub use directory::{ChildFactory, DirectoryCache};
pub use file::FileCache;
pub use xml::XmlDocument;

/// Structure derived from a file's raw contents.
pub trait FileIndex: Debug + Send + Sync {
    /// Rebuild everything derived from `data`.
    ///
    /// `fs` may be used to pull in auxiliary files (e.g. XML inclusions).
    fn index(&mut self, path: &Path, data: &[u8], fs: &dyn FileSystem) -> Result<()>;

    /// Whether `handle` belongs to an auxiliary file this index registered.
    fn watches(&self, _handle: WatchHandle) -> bool {
        false
    }
}

/// Index that keeps nothing beyond the raw bytes held by [`FileCache`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFile;

impl FileIndex for PlainFile {
    fn index(&mut self, _path: &Path, _data: &[u8], _fs: &dyn FileSystem) -> Result<()> {
        Ok(())
    }
}
