// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpoolError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A document could not be loaded (bad XML, bogus priority, ...).
    #[error("Failed to load {path}: {message}")]
    InitError { path: String, message: String },

    /// A filename does not follow the `<base>[.H_<host>|.G<prio>_<group>]`
    /// convention.
    #[error("Could not process filename {0}")]
    SpecificityError(String),

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    #[error("No matching source for entry {tag}({name})")]
    NoMatchingSource { tag: String, name: String },

    #[error(
        "Found conflicting sources with same priority {priority} for {tag}:{name} for {hostname}: {sources:?}"
    )]
    PriorityConflict {
        tag: String,
        name: String,
        hostname: String,
        priority: i64,
        sources: Vec<String>,
    },

    #[error("No matching entries available for {path} for {hostname}")]
    NoMatchingEntry { path: String, hostname: String },

    #[error(
        "Found conflicting group-specific entries with same priority for {path} for {hostname}: {candidates:?}"
    )]
    SpecificityConflict {
        path: String,
        hostname: String,
        candidates: Vec<String>,
    },

    #[error("Failed to set metadata for file {0}")]
    BindingError(String),

    #[error("No source handles entry {tag}({name})")]
    NotHandled { tag: String, name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpoolError {
    /// Whether this error is local to a single resolution request.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            SpoolError::NoMatchingSource { .. }
                | SpoolError::PriorityConflict { .. }
                | SpoolError::NoMatchingEntry { .. }
                | SpoolError::SpecificityConflict { .. }
                | SpoolError::BindingError(_)
                | SpoolError::NotHandled { .. }
                | SpoolError::UnknownTag(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SpoolError>;
