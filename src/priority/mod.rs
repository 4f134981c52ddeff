// src/priority/mod.rs

//! Priority-ranked XML sources.

pub mod matcher;
pub mod source;

pub use matcher::{NameMatch, PriorityMatcher};
pub use source::PrioritySource;
