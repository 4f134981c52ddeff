use groupspool::cache::{DirectoryCache, PlainFile};
use groupspool::types::{EventAction, FileEvent, WatchHandle};
use groupspool_test_utils::{RepoFixture, init_tracing};
use regex::Regex;

fn txt_cache(fx: &RepoFixture) -> DirectoryCache<PlainFile> {
    DirectoryCache::new(
        fx.root(),
        fx.fs(),
        fx.monitor(),
        Regex::new(r"^.*\.txt$").unwrap(),
        Box::new(|_| PlainFile),
    )
    .unwrap()
}

#[test]
fn test_initial_batch_loads_existing_files() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("a.txt", "alpha");
    fx.write("b.txt", "beta");
    fx.write("notes.md", "ignored");

    let mut cache = txt_cache(&fx);
    for event in fx.existing("") {
        cache.handle_event(&event);
    }

    let keys: Vec<_> = cache.entries().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec!["a.txt".to_string(), "b.txt".to_string()]);
    assert_eq!(cache.get("a.txt").unwrap().data(), b"alpha");
    assert_eq!(fx.registrations(""), 1);
}

#[test]
fn test_changed_reloads_without_replacing_entry() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("a.txt", "v1");
    let mut cache = txt_cache(&fx);
    cache.handle_event(&fx.event("", "a.txt", EventAction::Created));

    fx.write("a.txt", "v2");
    cache.handle_event(&fx.event("", "a.txt", EventAction::Changed));

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("a.txt").unwrap().text(), "v2");
}

#[test]
fn test_changed_before_created_is_treated_as_create() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("late.txt", "content");
    let mut cache = txt_cache(&fx);

    cache.handle_event(&fx.event("", "late.txt", EventAction::Changed));

    assert_eq!(cache.get("late.txt").unwrap().text(), "content");
}

#[test]
fn test_directory_delete_and_recreate_reuses_watch() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    let mut cache = txt_cache(&fx);

    fx.mkdir("sub");
    cache.handle_event(&fx.event("", "sub", EventAction::Created));
    assert!(cache.directories().contains("sub"));
    let sub_handle = fx.handle("sub");

    fx.write("sub/a.txt", "A");
    cache.handle_event(&fx.event("sub", "a.txt", EventAction::Created));
    assert!(cache.get("sub/a.txt").is_some());

    fx.remove("sub");
    cache.handle_event(&fx.event("", "sub", EventAction::Deleted));
    assert!(cache.get("sub/a.txt").is_none());
    assert!(cache.is_empty());
    assert!(!cache.directories().contains("sub"));
    assert_eq!(cache.handles().get(&sub_handle).map(String::as_str), Some("sub"));

    fx.mkdir("sub");
    cache.handle_event(&fx.event("", "sub", EventAction::Created));
    assert!(cache.directories().contains("sub"));
    assert_eq!(fx.registrations("sub"), 1);

    fx.write("sub/b.txt", "B");
    cache.handle_event(&FileEvent::new(sub_handle, "b.txt", EventAction::Created));
    assert_eq!(cache.get("sub/b.txt").unwrap().text(), "B");
}

#[test]
fn test_delete_uses_component_prefix() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    let mut cache = txt_cache(&fx);

    fx.mkdir("a");
    fx.mkdir("ab");
    cache.handle_event(&fx.event("", "a", EventAction::Created));
    cache.handle_event(&fx.event("", "ab", EventAction::Created));
    fx.write("a/x.txt", "x");
    fx.write("ab/y.txt", "y");
    cache.handle_event(&fx.event("a", "x.txt", EventAction::Created));
    cache.handle_event(&fx.event("ab", "y.txt", EventAction::Created));

    fx.remove("a");
    cache.handle_event(&fx.event("", "a", EventAction::Deleted));

    assert!(cache.get("a/x.txt").is_none());
    assert!(cache.get("ab/y.txt").is_some());
}

#[test]
fn test_ignore_filter_short_circuits() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("scratch_a.txt", "tmp");
    fx.write("keep.txt", "kept");
    let mut cache = txt_cache(&fx).with_ignore(Some(Regex::new(r"^scratch_").unwrap()));

    cache.handle_event(&fx.event("", "scratch_a.txt", EventAction::Created));
    cache.handle_event(&fx.event("", "keep.txt", EventAction::Created));

    assert_eq!(cache.len(), 1);
    assert!(cache.get("scratch_a.txt").is_none());
    assert!(cache.get("keep.txt").is_some());
}

#[test]
fn test_unknown_handle_and_end_exist_are_dropped() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("a.txt", "A");
    let mut cache = txt_cache(&fx);

    cache.handle_event(&FileEvent::new(WatchHandle(999), "a.txt", EventAction::Created));
    cache.handle_event(&fx.event("", "a.txt", EventAction::EndExist));

    assert!(cache.is_empty());
    assert!(!cache.owns(WatchHandle(999)));
}

#[test]
fn test_file_delete_removes_only_that_file() {
    init_tracing();
    let fx = RepoFixture::new("/repo");
    fx.write("a.txt", "A");
    fx.write("b.txt", "B");
    let mut cache = txt_cache(&fx);
    for event in fx.existing("") {
        cache.handle_event(&event);
    }

    fx.remove("a.txt");
    cache.handle_event(&fx.event("", "a.txt", EventAction::Deleted));

    assert!(cache.get("a.txt").is_none());
    assert!(cache.get("b.txt").is_some());
}
