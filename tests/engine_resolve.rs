mod common;

use std::sync::Arc;

use common::{client, package, path_entry, priority_doc};
use groupspool::engine::{Engine, Runtime, drain_pending};
use groupspool::errors::SpoolError;
use groupspool::resolve_to_xml;
use groupspool::types::{EventAction, FileEvent, WatchHandle};
use groupspool_test_utils::builders::ConfigFileBuilder;
use groupspool_test_utils::{RepoFixture, init_tracing, with_timeout};
use tokio::sync::mpsc;

fn repo() -> RepoFixture {
    let fx = RepoFixture::new("/repo");
    fx.write(
        "Pkgmgr/base.xml",
        priority_doc(
            10,
            r#"<Package name="foo" version="1.0"/><Path name="/etc/motd" owner="pkgmgr"/>"#,
        ),
    );
    fx.write(
        "Pkgmgr/prod.xml",
        priority_doc(20, r#"<Group name="prod"><Package name="foo" version="2.0"/></Group>"#),
    );
    fx.write("Cfg/etc/motd/motd", "welcome");
    fx.write("Cfg/etc/motd/motd.G10_prod", "welcome to prod");
    fx
}

fn engine(fx: &RepoFixture) -> Engine {
    let cfg = ConfigFileBuilder::new(fx.root())
        .with_priority("Pkgmgr")
        .with_spool("Cfg")
        .with_owner("admin")
        .build();
    let engine = Engine::from_config(&cfg, fx.fs(), fx.monitor()).unwrap();
    fx.load(&engine, "Pkgmgr");
    fx.load(&engine, "Cfg");
    engine
}

#[test]
fn test_from_config_builds_components_in_order() {
    init_tracing();
    let fx = repo();
    let engine = engine(&fx);

    assert_eq!(engine.matchers().len(), 1);
    assert_eq!(engine.spools().len(), 1);
    let spool = engine.spools()[0].read().unwrap();
    assert_eq!(spool.name(), "Cfg");
    assert_eq!(spool.root(), fx.path("Cfg"));
    assert!(spool.entry_set("/etc/motd").is_some());
}

#[test]
fn test_resolve_priority_entry() {
    init_tracing();
    let fx = repo();
    let engine = engine(&fx);

    let mut entry = package("foo");
    let attrs = engine.resolve(&client("h", &["prod"]), &mut entry).unwrap();
    assert_eq!(attrs["version"], "2.0");

    let xml = resolve_to_xml(&engine, &client("h", &[]), "Package", "foo").unwrap();
    assert_eq!(xml, "<Package name=\"foo\" version=\"1.0\"/>\n");
}

#[test]
fn test_spools_are_asked_before_matchers() {
    init_tracing();
    let fx = repo();
    let engine = engine(&fx);

    let mut entry = path_entry("/etc/motd");
    let attrs = engine.resolve(&client("h", &["prod"]), &mut entry).unwrap();

    assert_eq!(attrs["owner"], "admin");
    assert_eq!(entry.text.as_deref(), Some("welcome to prod"));
}

#[test]
fn test_unknown_entry_is_not_handled() {
    init_tracing();
    let fx = repo();
    let engine = engine(&fx);

    let err = engine
        .resolve(&client("h", &[]), &mut package("bar"))
        .unwrap_err();
    assert!(matches!(err, SpoolError::NotHandled { ref tag, .. } if tag == "Package"));

    let err = resolve_to_xml(&engine, &client("h", &[]), "Path", "/etc/hosts").unwrap_err();
    assert!(err.is_resolution_error());
}

#[test]
fn test_events_route_by_handle() {
    init_tracing();
    let fx = repo();
    let engine = engine(&fx);

    assert!(!engine.handle_event(&FileEvent::new(WatchHandle(9999), "x", EventAction::Created)));

    fx.write("Cfg/etc/motd/motd.H_h", "just h");
    assert!(engine.handle_event(&fx.event("Cfg/etc/motd", "motd.H_h", EventAction::Created)));
    let xml = resolve_to_xml(&engine, &client("h", &[]), "Path", "/etc/motd").unwrap();
    assert!(xml.contains(">just h</Path>"));

    fx.write(
        "Pkgmgr/prod.xml",
        priority_doc(20, r#"<Group name="prod"><Package name="foo" version="3.0"/></Group>"#),
    );
    assert!(engine.handle_event(&fx.event("Pkgmgr", "prod.xml", EventAction::Changed)));
    let attrs = engine
        .resolve(&client("h", &["prod"]), &mut package("foo"))
        .unwrap();
    assert_eq!(attrs["version"], "3.0");
}

#[test]
fn test_concurrent_resolution() {
    init_tracing();
    let fx = repo();
    let engine = engine(&fx);

    std::thread::scope(|scope| {
        for i in 0..4 {
            let engine = &engine;
            scope.spawn(move || {
                let md = client(&format!("h{i}"), &["prod"]);
                for _ in 0..50 {
                    let attrs = engine.resolve(&md, &mut package("foo")).unwrap();
                    assert_eq!(attrs["version"], "2.0");
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..50 {
                engine.handle_event(&fx.event("Cfg/etc/motd", "motd", EventAction::Changed));
            }
        });
    });
}

#[test]
fn test_drain_pending_applies_queued_events() {
    init_tracing();
    let fx = repo();
    let engine = engine(&fx);
    let (tx, mut rx) = mpsc::unbounded_channel();

    fx.write("Cfg/etc/motd/motd.H_a", "a");
    fx.write("Cfg/etc/motd/motd.H_b", "b");
    tx.send(fx.event("Cfg/etc/motd", "motd.H_a", EventAction::Created)).unwrap();
    tx.send(fx.event("Cfg/etc/motd", "motd.H_b", EventAction::Created)).unwrap();

    assert_eq!(drain_pending(&engine, &mut rx), 2);
    assert_eq!(drain_pending(&engine, &mut rx), 0);
    let spool = engine.spools()[0].read().unwrap();
    assert_eq!(spool.entry_set("/etc/motd").unwrap().len(), 4);
}

#[tokio::test]
async fn test_runtime_applies_events_until_channel_closes() {
    init_tracing();
    let fx = repo();
    let engine = Arc::new(engine(&fx));
    let (tx, rx) = mpsc::unbounded_channel();

    fx.write("Cfg/etc/motd/motd.H_live", "live");
    tx.send(fx.event("Cfg/etc/motd", "motd.H_live", EventAction::Created)).unwrap();
    drop(tx);

    let mut settled = Vec::new();
    let runtime = Runtime::new(Arc::clone(&engine), rx);
    with_timeout(runtime.run(|engine| {
        settled.push(resolve_to_xml(engine, &client("live", &[]), "Path", "/etc/motd"));
    }))
    .await
    .unwrap();

    assert_eq!(settled.len(), 1);
    let xml = settled[0].as_ref().unwrap();
    assert!(xml.contains(">live</Path>"));
}
