mod common;

use std::fs;
use std::sync::Arc;

use common::{XI, client, package, priority_doc};
use groupspool::engine::{Engine, drain_pending};
use groupspool::fs::{FileSystem, RealFileSystem};
use groupspool::resolve_to_xml;
use groupspool::types::{EventAction, FileEvent};
use groupspool::watch::{FileMonitor, NotifyMonitor};
use groupspool_test_utils::builders::ConfigFileBuilder;
use groupspool_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;
use tokio::sync::mpsc;

fn queued(rx: &mut mpsc::UnboundedReceiver<FileEvent>) -> Vec<FileEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn test_directory_registration_announces_contents() {
    init_tracing();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b.xml"), "<b/>").unwrap();
    fs::write(dir.path().join("a.xml"), "<a/>").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let monitor = NotifyMonitor::new(tx, fs).unwrap();
    let handle = monitor.add_monitor(dir.path()).unwrap();

    let abs = dir.path().to_string_lossy().into_owned();
    let events = queued(&mut rx);
    assert_eq!(
        events,
        vec![
            FileEvent::new(handle, abs.clone(), EventAction::Exists),
            FileEvent::new(handle, "a.xml", EventAction::Exists),
            FileEvent::new(handle, "b.xml", EventAction::Exists),
            FileEvent::new(handle, abs, EventAction::EndExist),
        ]
    );
}

#[test]
fn test_file_registration_and_stable_handles() {
    init_tracing();
    let dir = tempdir().unwrap();
    let file = dir.path().join("include.xml");
    fs::write(&file, "<x/>").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let monitor = NotifyMonitor::new(tx, Arc::new(RealFileSystem)).unwrap();

    let first = monitor.add_monitor(&file).unwrap();
    let events = queued(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, EventAction::Exists);
    assert_eq!(events[1].action, EventAction::EndExist);

    let again = monitor.add_monitor(&file).unwrap();
    assert_eq!(first, again);

    let other = monitor.add_monitor(dir.path()).unwrap();
    assert_ne!(first, other);
}

#[tokio::test]
async fn test_live_change_is_delivered() {
    init_tracing();
    let dir = tempdir().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let monitor = NotifyMonitor::new(tx, Arc::new(RealFileSystem)).unwrap();
    let handle = monitor.add_monitor(dir.path()).unwrap();
    queued(&mut rx);

    fs::write(dir.path().join("new.txt"), "hello").unwrap();

    let event = with_timeout(async {
        loop {
            let event = rx.recv().await.unwrap();
            if event.filename == "new.txt" {
                return event;
            }
        }
    })
    .await;
    assert_eq!(event.handle, handle);
    assert!(matches!(event.action, EventAction::Created | EventAction::Changed));
}

#[test]
fn test_engine_over_real_tree() {
    init_tracing();
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("Pkgmgr")).unwrap();
    fs::create_dir_all(root.join("Cfg/etc/motd")).unwrap();
    fs::write(
        root.join("Pkgmgr/base.xml"),
        r#"<Pkgmgr priority="1"><Package name="foo" version="1.0"/></Pkgmgr>"#,
    )
    .unwrap();
    fs::write(root.join("Cfg/etc/motd/motd"), "on disk").unwrap();
    fs::write(root.join("Cfg/etc/motd/info"), "owner: www\n").unwrap();

    let cfg = ConfigFileBuilder::new(root)
        .with_priority("Pkgmgr")
        .with_spool("Cfg")
        .build();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let monitor: Arc<dyn FileMonitor> = Arc::new(NotifyMonitor::new(tx, Arc::clone(&fs)).unwrap());
    let engine = Engine::from_config(&cfg, fs, monitor).unwrap();

    assert!(drain_pending(&engine, &mut rx) > 0);

    let md = client("h", &[]);
    let pkg = resolve_to_xml(&engine, &md, "Package", "foo").unwrap();
    assert_eq!(pkg, "<Package name=\"foo\" version=\"1.0\"/>\n");

    let motd = resolve_to_xml(&engine, &md, "Path", "/etc/motd").unwrap();
    assert!(motd.contains("owner=\"www\""));
    assert!(motd.contains(">on disk</Path>"));
}

fn source_names(engine: &Engine) -> Vec<String> {
    let matcher = engine.matchers()[0].read().unwrap();
    matcher.sources().entries().map(|(name, _)| name.clone()).collect()
}

/// Drain the channel until `done` holds for the engine.
async fn settle(
    engine: &Engine,
    rx: &mut mpsc::UnboundedReceiver<FileEvent>,
    done: impl Fn(&Engine) -> bool,
) {
    with_timeout(async {
        while !done(engine) {
            match rx.recv().await {
                Some(event) => {
                    engine.handle_event(&event);
                }
                None => break,
            }
        }
    })
    .await;
}

#[tokio::test]
async fn test_included_sibling_gets_its_own_events() {
    init_tracing();
    let dir = tempdir().unwrap();
    let rules = dir.path().join("Rules");
    fs::create_dir_all(&rules).unwrap();
    fs::write(
        rules.join("a.xml"),
        priority_doc(
            1,
            &format!(r#"<Group name="all" {XI}><xi:include href="b.xml"/></Group>"#),
        ),
    )
    .unwrap();
    fs::write(rules.join("b.xml"), priority_doc(5, r#"<Package name="bar" version="1.0"/>"#))
        .unwrap();

    let cfg = ConfigFileBuilder::new(dir.path()).with_priority("Rules").build();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let monitor: Arc<dyn FileMonitor> = Arc::new(NotifyMonitor::new(tx, Arc::clone(&fs)).unwrap());
    let engine = Engine::from_config(&cfg, fs, monitor).unwrap();
    drain_pending(&engine, &mut rx);
    assert_eq!(source_names(&engine), vec!["a.xml", "b.xml"]);

    let md = client("h", &["all"]);
    let version = |engine: &Engine| {
        engine
            .resolve(&md, &mut package("bar"))
            .ok()
            .and_then(|attrs| attrs.get("version").cloned())
    };
    assert_eq!(version(&engine).as_deref(), Some("1.0"));

    fs::write(rules.join("b.xml"), priority_doc(5, r#"<Package name="bar" version="2.0"/>"#))
        .unwrap();
    settle(&engine, &mut rx, |engine| version(engine).as_deref() == Some("2.0")).await;

    fs::remove_file(rules.join("b.xml")).unwrap();
    settle(&engine, &mut rx, |engine| !source_names(engine).contains(&"b.xml".to_string())).await;
    assert_eq!(source_names(&engine), vec!["a.xml"]);
}

#[test]
fn test_registration_survives_closed_channel() {
    init_tracing();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.xml"), "<a/>").unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let monitor = NotifyMonitor::new(tx, Arc::new(RealFileSystem)).unwrap();

    let handle = monitor.add_monitor(dir.path()).unwrap();
    assert_eq!(monitor.add_monitor(dir.path()).unwrap(), handle);
}
