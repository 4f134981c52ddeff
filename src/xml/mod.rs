// src/xml/mod.rs

//! Owned XML element tree.
//!
//! Documents are parsed with `roxmltree` and immediately converted into
//! plain [`Element`] values so that the caches can keep, copy, and rebuild
//! them freely. Comments and processing instructions are dropped during
//! conversion; whitespace-only text is treated as absent.

pub mod element;
pub mod parse;

pub use element::Element;
pub use parse::parse_element;

/// Namespace of inclusion directives (`<xi:include href="..."/>`).
pub const XINCLUDE_NAMESPACE: &str = "http://www.w3.org/2001/XInclude";
