// src/spool/info.rs

//! Per-directory file metadata (`info`, `:info`, `info.xml`).

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;
use tracing::{error, warn};

use crate::errors::{Result, SpoolError};
use crate::priority::PrioritySource;
use crate::types::ClientMetadata;
use crate::xml::Element;

/// Sidecar filenames recognised inside a spool directory.
pub const INFO_FILES: [&str; 3] = ["info", "info.xml", ":info"];

/// Ownership and mode attributes bound onto every file entry.
///
/// This doubles as the `[metadata]` configuration section; each entry set
/// keeps an immutable copy and derives its effective value from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileMetadata {
    pub owner: String,
    pub group: String,
    pub perms: String,
    pub secontext: String,
    pub important: bool,
    pub paranoid: bool,
    pub sensitive: bool,
    pub encoding: Option<String>,
    pub mtime: Option<String>,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            owner: "root".to_string(),
            group: "root".to_string(),
            perms: "0644".to_string(),
            secontext: "__default__".to_string(),
            important: false,
            paranoid: false,
            sensitive: false,
            encoding: None,
            mtime: None,
        }
    }
}

impl FileMetadata {
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::from([
            ("owner".to_string(), self.owner.clone()),
            ("group".to_string(), self.group.clone()),
            ("perms".to_string(), self.perms.clone()),
            ("secontext".to_string(), self.secontext.clone()),
            ("important".to_string(), self.important.to_string()),
            ("paranoid".to_string(), self.paranoid.to_string()),
            ("sensitive".to_string(), self.sensitive.to_string()),
        ]);
        if let Some(encoding) = &self.encoding {
            attrs.insert("encoding".to_string(), encoding.clone());
        }
        if let Some(mtime) = &self.mtime {
            attrs.insert("mtime".to_string(), mtime.clone());
        }
        attrs
    }

    /// A copy with every field present in `patch` overwritten.
    pub fn patched(&self, patch: &InfoPatch) -> Self {
        let mut out = self.clone();
        if let Some(v) = &patch.owner {
            out.owner = v.clone();
        }
        if let Some(v) = &patch.group {
            out.group = v.clone();
        }
        if let Some(v) = &patch.perms {
            out.perms = normalize_perms(v);
        }
        if let Some(v) = &patch.secontext {
            out.secontext = v.clone();
        }
        if let Some(v) = patch.important {
            out.important = v;
        }
        if let Some(v) = patch.paranoid {
            out.paranoid = v;
        }
        if let Some(v) = patch.sensitive {
            out.sensitive = v;
        }
        if let Some(v) = &patch.encoding {
            out.encoding = Some(v.clone());
        }
        if let Some(v) = &patch.mtime {
            out.mtime = Some(v.clone());
        }
        out
    }
}

/// Left-pad a three digit mode with `0`.
pub fn normalize_perms(perms: &str) -> String {
    if perms.len() == 3 {
        format!("0{perms}")
    } else {
        perms.to_string()
    }
}

/// Fields set by one `info` file. `None` keeps the default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InfoPatch {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub perms: Option<String>,
    pub secontext: Option<String>,
    pub important: Option<bool>,
    pub paranoid: Option<bool>,
    pub sensitive: Option<bool>,
    pub encoding: Option<String>,
    pub mtime: Option<String>,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `key: value` lines. Blank lines are skipped; anything else that is
/// not a recognised directive is logged and skipped.
pub fn parse_info(text: &str) -> InfoPatch {
    let line_re = Regex::new(
        r"^\s*(owner|group|perms|secontext|paranoid|sensitive|encoding|important|mtime):\s*(\S+)",
    );
    let Ok(line_re) = line_re else {
        return InfoPatch::default();
    };

    let mut patch = InfoPatch::default();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = line_re.captures(line) else {
            warn!(%line, "failed to match line in info file");
            continue;
        };
        let value = caps[2].to_string();
        match &caps[1] {
            "owner" => patch.owner = Some(value),
            "group" => patch.group = Some(value),
            "perms" => patch.perms = Some(value),
            "secontext" => patch.secontext = Some(value),
            "encoding" => patch.encoding = Some(value),
            "mtime" => patch.mtime = Some(value),
            key => {
                let Some(flag) = parse_flag(&value) else {
                    warn!(%key, %value, "expected a boolean in info file");
                    continue;
                };
                match key {
                    "important" => patch.important = Some(flag),
                    "paranoid" => patch.paranoid = Some(flag),
                    _ => patch.sensitive = Some(flag),
                }
            }
        }
    }
    patch
}

/// Stamp `defaults` onto `entry`, then, if an `info.xml` source is given,
/// overlay the unnamed `Info` item that applies to this client and path.
pub fn bind_info(
    entry: &mut Element,
    metadata: &ClientMetadata,
    infoxml: Option<&PrioritySource>,
    defaults: &FileMetadata,
) -> Result<()> {
    for (key, value) in defaults.to_attributes() {
        entry.set(key, value);
    }
    let Some(infoxml) = infoxml else {
        return Ok(());
    };

    let info = infoxml
        .match_entry(metadata, entry)
        .and_then(|mut matches| matches.remove("Info"))
        .and_then(|mut items| items.remove(&None));
    let Some(info) = info else {
        let name = entry.name().unwrap_or_default().to_string();
        error!(entry = %name, source = ?infoxml.path(), "failed to set metadata for file");
        return Err(SpoolError::BindingError(name));
    };
    for (key, value) in info.attributes {
        entry.set(key, value);
    }
    Ok(())
}
