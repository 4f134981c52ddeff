// src/spool/mod.rs

//! Group- and host-specific file spools.
//!
//! A [`SpoolManager`] mirrors a directory tree and keeps one [`EntrySet`]
//! per logical path. Each entry set holds the physical variants of that
//! path, tagged with a [`Specificity`] decoded from the filename, plus the
//! directory's `info`/`info.xml` metadata overlay.

pub mod entry_set;
pub mod info;
pub mod manager;
pub mod specificity;

pub use entry_set::{EntrySet, IGNORE_PATTERN, SpecificData, SpecificFile};
pub use info::{FileMetadata, INFO_FILES, InfoPatch, bind_info, normalize_perms, parse_info};
pub use manager::SpoolManager;
pub use specificity::{Specificity, SpecificityKind, SpecificityPattern};
