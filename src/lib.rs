// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod predicate;
pub mod priority;
pub mod spool;
pub mod types;
pub mod watch;
pub mod xml;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::engine::{Engine, Runtime, drain_pending};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{ClientMetadata, FileEvent};
use crate::watch::{FileMonitor, NotifyMonitor};
use crate::xml::Element;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the `notify` monitor and the engine's caches
/// - one resolution for the requested client/entry
/// - (optional) live re-resolution until Ctrl-C
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let hostname = args.host.clone().context("--host is required")?;
    let name = args.name.clone().context("--name is required")?;
    let metadata = ClientMetadata::new(hostname, args.groups.iter().cloned());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<FileEvent>();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let monitor: Arc<dyn FileMonitor> = Arc::new(NotifyMonitor::new(event_tx, Arc::clone(&fs))?);

    let engine = Engine::from_config(&cfg, fs, monitor)?;
    let applied = drain_pending(&engine, &mut event_rx);
    info!(applied, "initial load complete");

    let mut last = resolve_to_xml(&engine, &metadata, &args.tag, &name);
    print_resolution(&last);

    if !args.watch {
        return Ok(());
    }

    let runtime = Runtime::new(Arc::new(engine), event_rx);
    runtime
        .run(|engine| {
            let current = resolve_to_xml(engine, &metadata, &args.tag, &name);
            if outcome(&current) != outcome(&last) {
                print_resolution(&current);
            } else {
                debug!("resolution unchanged");
            }
            last = current;
        })
        .await?;
    Ok(())
}

/// Resolve one entry and render it as XML.
pub fn resolve_to_xml(
    engine: &Engine,
    metadata: &ClientMetadata,
    tag: &str,
    name: &str,
) -> errors::Result<String> {
    let mut entry = Element::new(tag).with_attr("name", name);
    engine.resolve(metadata, &mut entry)?;
    Ok(entry.to_xml_string())
}

fn outcome(result: &errors::Result<String>) -> String {
    match result {
        Ok(xml) => xml.clone(),
        Err(err) => err.to_string(),
    }
}

fn print_resolution(result: &errors::Result<String>) {
    match result {
        Ok(xml) => print!("{xml}"),
        Err(err) => error!(error = %err, "resolution failed"),
    }
}

/// Simple dry-run output: print server settings and plugins.
fn print_dry_run(cfg: &ConfigFile) {
    println!("groupspool dry-run");
    println!("  server.repository = {}", cfg.server.repository.display());
    println!("  server.encoding = {}", cfg.server.encoding);
    if let Some(ref ignore) = cfg.server.ignore {
        println!("  server.ignore = {ignore}");
    }
    println!(
        "  metadata = owner:{} group:{} perms:{}",
        cfg.metadata.owner, cfg.metadata.group, cfg.metadata.perms
    );
    println!();

    println!("priority ({}):", cfg.priority.len());
    for section in &cfg.priority {
        println!("  - {}", section.name);
        println!("      path: {}", cfg.plugin_root(section.dir()).display());
        println!("      names: {:?}", section.names);
    }

    println!("spool ({}):", cfg.spool.len());
    for section in &cfg.spool {
        println!("  - {}", section.name);
        println!("      path: {}", cfg.plugin_root(section.dir()).display());
        println!("      entry_type: {}", section.entry_type);
    }

    debug!("dry-run complete (nothing watched)");
}
