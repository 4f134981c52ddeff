#![allow(dead_code)]

use groupspool::types::ClientMetadata;
use groupspool::xml::Element;

pub const XI: &str = r#"xmlns:xi="http://www.w3.org/2001/XInclude""#;

pub fn client(hostname: &str, groups: &[&str]) -> ClientMetadata {
    ClientMetadata::new(hostname, groups.iter().copied())
}

pub fn path_entry(name: &str) -> Element {
    Element::new("Path").with_attr("name", name)
}

pub fn package(name: &str) -> Element {
    Element::new("Package").with_attr("name", name)
}

/// `<Pkgmgr priority="..">body</Pkgmgr>`
pub fn priority_doc(priority: i64, body: &str) -> String {
    format!(r#"<Pkgmgr priority="{priority}">{body}</Pkgmgr>"#)
}
