use std::fs;
use std::path::PathBuf;

use groupspool::cli::LogLevel;
use groupspool::config::{RawConfigFile, load_and_validate, load_from_path, validate_config};
use groupspool::errors::SpoolError;
use groupspool::logging::build_filter;
use groupspool::priority::NameMatch;
use groupspool_test_utils::builders::ConfigFileBuilder;
use tempfile::tempdir;
use tracing_subscriber::filter::LevelFilter;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("groupspool.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn test_full_config_loads() {
    let (_dir, path) = write_config(
        r#"
[server]
repository = "/var/lib/groupspool"
encoding = "latin-1"
ignore = '^\.#'

[metadata]
owner = "admin"
perms = "640"
paranoid = true

[[priority]]
name = "Pkgmgr"
names = "pattern"

[[priority]]
name = "Rules"
path = "rules.d"

[[spool]]
name = "Cfg"
entry_type = "ConfigFile"
"#,
    );

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.server.repository, PathBuf::from("/var/lib/groupspool"));
    assert_eq!(cfg.server.encoding, "latin-1");
    assert!(cfg.ignore.as_ref().is_some_and(|re| re.is_match(".#motd")));

    assert_eq!(cfg.metadata.owner, "admin");
    assert_eq!(cfg.metadata.group, "root");
    assert_eq!(cfg.metadata.perms, "0640");
    assert!(cfg.metadata.paranoid);

    assert_eq!(cfg.priority[0].names, NameMatch::Pattern);
    assert_eq!(cfg.priority[1].names, NameMatch::Exact);
    assert_eq!(cfg.priority[1].dir(), "rules.d");
    assert_eq!(cfg.spool[0].entry_type, "ConfigFile");
    assert_eq!(
        cfg.plugin_root(cfg.priority[1].dir()),
        PathBuf::from("/var/lib/groupspool/rules.d")
    );

    let names: Vec<_> = cfg.plugin_names().collect();
    assert_eq!(names, vec!["Pkgmgr", "Rules", "Cfg"]);
}

#[test]
fn test_defaults_and_relative_repository() {
    let (dir, path) = write_config("[[spool]]\nname = \"Cfg\"\n");

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.server.repository, dir.path().join("."));
    assert_eq!(cfg.server.encoding, "UTF-8");
    assert!(cfg.ignore.is_none());
    assert_eq!(cfg.metadata.perms, "0644");
    assert_eq!(cfg.spool[0].entry_type, "Path");
    assert_eq!(cfg.spool[0].dir(), "Cfg");
}

#[test]
fn test_raw_config_skips_validation() {
    let (_dir, path) = write_config("[server]\nencoding = \"\"\n");

    let raw = load_from_path(&path).unwrap();
    assert!(raw.priority.is_empty());
    assert!(validate_config(&raw).is_err());
}

#[test]
fn test_malformed_toml_is_reported() {
    let (_dir, path) = write_config("[[spool]\nname = ");

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, SpoolError::TomlError(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = load_and_validate(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SpoolError::IoError(_)));
}

#[test]
fn test_validation_failures() {
    let cases: Vec<(&str, RawConfigFile)> = vec![
        ("no plugins", ConfigFileBuilder::new("/repo").raw()),
        (
            "duplicate names",
            ConfigFileBuilder::new("/repo")
                .with_priority("Cfg")
                .with_spool("Cfg")
                .raw(),
        ),
        (
            "bad ignore regex",
            ConfigFileBuilder::new("/repo")
                .with_spool("Cfg")
                .with_ignore("(unclosed")
                .raw(),
        ),
        (
            "non-octal perms",
            ConfigFileBuilder::new("/repo")
                .with_spool("Cfg")
                .with_perms("0x44")
                .raw(),
        ),
        (
            "empty owner",
            ConfigFileBuilder::new("/repo")
                .with_spool("Cfg")
                .with_owner(" ")
                .raw(),
        ),
        (
            "empty plugin name",
            ConfigFileBuilder::new("/repo").with_priority("").raw(),
        ),
    ];

    for (label, raw) in cases {
        let err = validate_config(&raw).unwrap_err();
        assert!(matches!(err, SpoolError::ConfigError(_)), "{label}: {err}");
    }
}

#[test]
fn test_builder_normalizes_perms() {
    let cfg = ConfigFileBuilder::new("/repo")
        .with_spool("Cfg")
        .with_perms("755")
        .build();
    assert_eq!(cfg.metadata.perms, "0755");
}

#[test]
fn test_log_filter_precedence() {
    let from_cli = build_filter(Some(LogLevel::Warn), Some("trace")).unwrap();
    assert_eq!(from_cli.max_level_hint(), Some(LevelFilter::WARN));

    let from_env = build_filter(None, Some("debug")).unwrap();
    assert_eq!(from_env.max_level_hint(), Some(LevelFilter::DEBUG));

    let fallback = build_filter(None, Some("  ")).unwrap();
    assert_eq!(fallback.max_level_hint(), Some(LevelFilter::INFO));

    assert!(build_filter(None, Some("groupspool=loud")).is_err());
}
