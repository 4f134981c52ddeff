// src/spool/specificity.rs

//! How precisely a file variant targets a client.
//!
//! Variants of a logical file `motd` are named
//!
//! - `motd` for everybody,
//! - `motd.G<prio>_<group>` for members of `<group>`,
//! - `motd.H_<hostname>` for one host,
//!
//! optionally followed by a delta suffix (`motd.H_foo.cat`) when the set
//! was built with [`SpecificityPattern::with_delta`].

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::errors::{Result, SpoolError};
use crate::types::ClientMetadata;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecificityKind {
    All,
    Group { name: String, priority: u32 },
    Host(String),
}

impl SpecificityKind {
    fn rank(&self) -> u8 {
        match self {
            SpecificityKind::All => 0,
            SpecificityKind::Group { .. } => 1,
            SpecificityKind::Host(_) => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specificity {
    pub kind: SpecificityKind,
    pub delta: Option<String>,
}

impl Specificity {
    pub fn all() -> Self {
        Self {
            kind: SpecificityKind::All,
            delta: None,
        }
    }

    pub fn group(name: impl Into<String>, priority: u32) -> Self {
        Self {
            kind: SpecificityKind::Group {
                name: name.into(),
                priority,
            },
            delta: None,
        }
    }

    pub fn host(hostname: impl Into<String>) -> Self {
        Self {
            kind: SpecificityKind::Host(hostname.into()),
            delta: None,
        }
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, SpecificityKind::Group { .. })
    }

    /// Whether this variant applies to the client at all.
    pub fn matches(&self, metadata: &ClientMetadata) -> bool {
        match &self.kind {
            SpecificityKind::All => true,
            SpecificityKind::Group { name, .. } => metadata.in_group(name),
            SpecificityKind::Host(hostname) => *hostname == metadata.hostname,
        }
    }

    /// Least to most specific: all < group (by ascending priority) < host.
    ///
    /// Two groups with the same priority, or two hosts, compare equal.
    pub fn precedence(&self, other: &Specificity) -> Ordering {
        match (&self.kind, &other.kind) {
            (
                SpecificityKind::Group { priority: a, .. },
                SpecificityKind::Group { priority: b, .. },
            ) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    /// Physical filename encoding this specificity for `basename`.
    pub fn filename(&self, basename: &str) -> String {
        let mut name = match &self.kind {
            SpecificityKind::All => basename.to_string(),
            SpecificityKind::Group { name, priority } => {
                format!("{basename}.G{priority:02}_{name}")
            }
            SpecificityKind::Host(hostname) => format!("{basename}.H_{hostname}"),
        };
        if let Some(delta) = &self.delta {
            name.push('.');
            name.push_str(delta);
        }
        name
    }
}

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SpecificityKind::All => f.write_str("all")?,
            SpecificityKind::Group { name, priority } => {
                write!(f, "Group {name}, priority {priority}")?
            }
            SpecificityKind::Host(hostname) => write!(f, "Host {hostname}")?,
        }
        if let Some(delta) = &self.delta {
            write!(f, ", delta={delta}")?;
        }
        Ok(())
    }
}

/// Compiled filename convention for one logical basename.
#[derive(Debug, Clone)]
pub struct SpecificityPattern {
    base: String,
    deltas: Vec<String>,
    regex: Regex,
}

impl SpecificityPattern {
    /// `basename` is escaped unless `is_regex` is set.
    pub fn new(basename: &str, is_regex: bool) -> Result<Self> {
        let base = if is_regex {
            basename.to_string()
        } else {
            regex::escape(basename)
        };
        let regex = compile(&base, &[])?;
        Ok(Self {
            base,
            deltas: Vec::new(),
            regex,
        })
    }

    /// Also accept one of `deltas` as a trailing `.<delta>` suffix.
    pub fn with_delta(mut self, deltas: &[&str]) -> Result<Self> {
        self.deltas = deltas.iter().map(|d| d.to_string()).collect();
        self.regex = compile(&self.base, &self.deltas)?;
        Ok(self)
    }

    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }

    /// Decode `fname`; a name outside the convention is a
    /// [`SpoolError::SpecificityError`].
    pub fn parse(&self, fname: &str) -> Result<Specificity> {
        let caps = self
            .regex
            .captures(fname)
            .ok_or_else(|| SpoolError::SpecificityError(fname.to_string()))?;

        let kind = if let Some(host) = caps.name("hostname") {
            SpecificityKind::Host(host.as_str().to_string())
        } else if let Some(group) = caps.name("group") {
            let priority = caps
                .name("prio")
                .and_then(|p| p.as_str().parse::<u32>().ok())
                .ok_or_else(|| SpoolError::SpecificityError(fname.to_string()))?;
            SpecificityKind::Group {
                name: group.as_str().to_string(),
                priority,
            }
        } else {
            SpecificityKind::All
        };

        Ok(Specificity {
            kind,
            delta: caps.name("delta").map(|d| d.as_str().to_string()),
        })
    }
}

fn compile(base: &str, deltas: &[String]) -> Result<Regex> {
    let mut pattern = format!(
        r"^(.*/)?{base}(\.((H_(?P<hostname>\S+?))|(G(?P<prio>\d+)_(?P<group>\S+?))))?"
    );
    if !deltas.is_empty() {
        let alternatives: Vec<String> = deltas.iter().map(|d| regex::escape(d)).collect();
        pattern.push_str(&format!(r"(\.(?P<delta>{}))?", alternatives.join("|")));
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|err| SpoolError::ConfigError(err.to_string()))
}
