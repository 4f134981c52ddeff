// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `groupspool`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "groupspool",
    version,
    about = "Resolve group- and host-specific configuration entries for a client.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `groupspool.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "groupspool.toml")]
    pub config: String,

    /// Hostname of the client to resolve for.
    #[arg(long, value_name = "HOSTNAME")]
    pub host: Option<String>,

    /// Group the client belongs to (repeatable).
    #[arg(long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,

    /// Tag of the entry to resolve.
    #[arg(long, value_name = "TAG", default_value = "Path")]
    pub tag: String,

    /// Name of the entry to resolve (e.g. `/etc/motd`).
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GROUPSPOOL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Keep watching the repository and print the entry again whenever the
    /// resolution changes.
    #[arg(long)]
    pub watch: bool,

    /// Parse + validate the config, print the configured plugins, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
