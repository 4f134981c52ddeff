mod common;

use common::{client, path_entry};
use groupspool::errors::SpoolError;
use groupspool::spool::{SpecificFile, SpoolManager};
use groupspool::types::{EventAction, FileEvent, WatchHandle};
use groupspool_test_utils::{RepoFixture, init_tracing};
use regex::Regex;

type Spool = SpoolManager<SpecificFile>;

fn spool(fx: &RepoFixture) -> Spool {
    fx.mkdir("Cfg");
    SpoolManager::new("Cfg", fx.path("Cfg"), fx.fs(), fx.monitor()).unwrap()
}

/// Replay the initial batch of every directory below `dir`, the way the
/// monitor announces each newly watched directory.
fn load(fx: &RepoFixture, spool: &mut Spool, dir: &str) {
    let mut pending = vec![fx.path(dir)];
    let mut seen = fx.monitor.registrations().len();
    while let Some(path) = pending.pop() {
        for event in fx.monitor.existing_events(&path, &fx.fs) {
            spool.handle_event(&event);
        }
        let registrations = fx.monitor.registrations();
        pending.extend(registrations[seen..].iter().map(|(_, p)| p.clone()));
        seen = registrations.len();
    }
}

fn populated() -> (RepoFixture, Spool) {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("Cfg/etc/motd/motd", "hello");
    fx.write("Cfg/etc/motd/motd.H_h1", "hello h1");
    fx.write("Cfg/etc/issue/issue.G05_web", "web issue");
    let mut spool = spool(&fx);
    load(&fx, &mut spool, "Cfg");
    (fx, spool)
}

#[test]
fn test_tree_becomes_entry_sets() {
    let (_fx, spool) = populated();

    let idents: Vec<_> = spool.entries().keys().cloned().collect();
    assert_eq!(idents, vec!["/etc/issue".to_string(), "/etc/motd".to_string()]);

    let motd = spool.entry_set("/etc/motd").unwrap();
    assert_eq!(motd.basename(), "motd");
    assert_eq!(motd.len(), 2);

    let mut framed: Vec<_> = spool.handles().values().cloned().collect();
    framed.sort();
    assert_eq!(framed, vec!["/", "/etc/", "/etc/issue/", "/etc/motd/"]);
}

#[test]
fn test_bind_entry_uses_best_variant() {
    let (_fx, spool) = populated();

    let mut entry = path_entry("/etc/motd");
    assert!(spool.handles_entry(&entry));
    spool.bind_entry(&mut entry, &client("h1", &[])).unwrap();
    assert_eq!(entry.text.as_deref(), Some("hello h1"));
    assert_eq!(entry.get("owner"), Some("root"));

    let mut issue = path_entry("/etc/issue");
    let err = spool.bind_entry(&mut issue, &client("h1", &[])).unwrap_err();
    assert!(matches!(err, SpoolError::NoMatchingEntry { .. }));
}

#[test]
fn test_unknown_entries_are_not_handled() {
    let (_fx, spool) = populated();

    let mut unknown = path_entry("/etc/hosts");
    assert!(!spool.handles_entry(&unknown));
    let err = spool.bind_entry(&mut unknown, &client("h", &[])).unwrap_err();
    assert!(matches!(err, SpoolError::NotHandled { ref name, .. } if name == "/etc/hosts"));

    let mut wrong_tag = common::package("/etc/motd");
    assert!(!spool.handles_entry(&wrong_tag));
    assert!(spool.bind_entry(&mut wrong_tag, &client("h", &[])).is_err());
}

#[test]
fn test_event_identifiers() {
    let (fx, spool) = populated();

    let file = fx.event("Cfg/etc/motd", "motd.H_h1", EventAction::Changed);
    assert_eq!(spool.event_id(&file).as_deref(), Some("/etc/motd"));
    assert_eq!(spool.event_path(&file), Some(fx.path("Cfg/etc/motd/motd.H_h1")));

    let dir = fx.event("Cfg/etc", "motd", EventAction::Changed);
    assert_eq!(spool.event_id(&dir).as_deref(), Some("/etc/motd"));

    let stray = FileEvent::new(WatchHandle(404), "x", EventAction::Changed);
    assert!(spool.event_id(&stray).is_none());
}

#[test]
fn test_file_events_update_variants() {
    let (fx, mut spool) = populated();

    fx.write("Cfg/etc/motd/motd", "changed");
    spool.handle_event(&fx.event("Cfg/etc/motd", "motd", EventAction::Changed));
    let mut entry = path_entry("/etc/motd");
    spool.bind_entry(&mut entry, &client("h2", &[])).unwrap();
    assert_eq!(entry.text.as_deref(), Some("changed"));

    fx.remove("Cfg/etc/motd/motd.H_h1");
    spool.handle_event(&fx.event("Cfg/etc/motd", "motd.H_h1", EventAction::Deleted));
    assert_eq!(spool.entry_set("/etc/motd").unwrap().len(), 1);

    fx.write("Cfg/etc/motd/info", "owner: www\nperms: 600\n");
    spool.handle_event(&fx.event("Cfg/etc/motd", "info", EventAction::Created));
    let mut entry = path_entry("/etc/motd");
    spool.bind_entry(&mut entry, &client("h1", &[])).unwrap();
    assert_eq!(entry.get("owner"), Some("www"));
    assert_eq!(entry.get("perms"), Some("0600"));
    assert_eq!(entry.text.as_deref(), Some("changed"));
}

#[test]
fn test_new_directory_then_file() {
    let (fx, mut spool) = populated();

    fx.mkdir("Cfg/etc/hosts");
    spool.handle_event(&fx.event("Cfg/etc", "hosts", EventAction::Created));
    assert!(spool.handles().values().any(|h| h == "/etc/hosts/"));
    assert!(spool.entry_set("/etc/hosts").is_none());

    fx.write("Cfg/etc/hosts/hosts", "127.0.0.1 localhost");
    spool.handle_event(&fx.event("Cfg/etc/hosts", "hosts", EventAction::Created));
    assert!(spool.handles_entry(&path_entry("/etc/hosts")));
}

#[test]
fn test_directory_delete_drops_descendants_and_keeps_watch() {
    let (fx, mut spool) = populated();
    let etc_handle = fx.handle("Cfg/etc");
    let motd_handle = fx.handle("Cfg/etc/motd");

    fx.remove("Cfg/etc");
    spool.handle_event(&fx.event("Cfg", "etc", EventAction::Deleted));
    assert!(spool.entries().is_empty());
    assert!(spool.owns(etc_handle));
    assert!(spool.owns(motd_handle));

    fx.write("Cfg/etc/motd/motd", "back");
    spool.handle_event(&fx.event("Cfg", "etc", EventAction::Created));
    spool.handle_event(&FileEvent::new(etc_handle, "motd", EventAction::Created));
    spool.handle_event(&FileEvent::new(motd_handle, "motd", EventAction::Created));

    assert_eq!(fx.registrations("Cfg/etc"), 1);
    assert_eq!(fx.registrations("Cfg/etc/motd"), 1);
    let mut entry = path_entry("/etc/motd");
    spool.bind_entry(&mut entry, &client("h1", &[])).unwrap();
    assert_eq!(entry.text.as_deref(), Some("back"));
}

#[test]
fn test_subdirectory_delete_keeps_siblings() {
    let (fx, mut spool) = populated();

    fx.remove("Cfg/etc/motd");
    spool.handle_event(&fx.event("Cfg/etc", "motd", EventAction::Deleted));

    assert!(spool.entry_set("/etc/motd").is_none());
    assert!(spool.entry_set("/etc/issue").is_some());
}

#[test]
fn test_root_level_files_are_ignored() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("Cfg/README", "not a spool entry");
    let mut spool = spool(&fx);
    load(&fx, &mut spool, "Cfg");

    spool.handle_event(&fx.event("Cfg", "README", EventAction::Changed));
    assert!(spool.entries().is_empty());
}

#[test]
fn test_ignore_regex_and_unknown_handles() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("Cfg/.git/HEAD", "ref");
    fx.write("Cfg/etc/motd/motd", "hello");
    fx.mkdir("Cfg");
    let mut spool = SpoolManager::<SpecificFile>::new("Cfg", fx.path("Cfg"), fx.fs(), fx.monitor())
        .unwrap()
        .with_ignore(Some(Regex::new(r"^\.git$").unwrap()));
    load(&fx, &mut spool, "Cfg");

    assert_eq!(fx.registrations("Cfg/.git"), 0);
    assert!(spool.entry_set("/etc/motd").is_some());

    spool.handle_event(&FileEvent::new(WatchHandle(999), "motd", EventAction::Deleted));
    assert!(spool.entry_set("/etc/motd").is_some());
}

#[test]
fn test_custom_entry_type() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("Cfg/etc/motd/motd", "hello");
    fx.mkdir("Cfg");
    let mut spool = SpoolManager::<SpecificFile>::new("Cfg", fx.path("Cfg"), fx.fs(), fx.monitor())
        .unwrap()
        .with_entry_type("ConfigFile");
    load(&fx, &mut spool, "Cfg");

    assert_eq!(spool.entry_type(), "ConfigFile");
    assert!(!spool.handles_entry(&path_entry("/etc/motd")));
    let entry = groupspool::xml::Element::new("ConfigFile").with_attr("name", "/etc/motd");
    assert!(spool.handles_entry(&entry));
    assert_eq!(spool.entry_set("/etc/motd").unwrap().entry_type(), "ConfigFile");
}
