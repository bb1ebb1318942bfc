//! Command-line interface handling for the Murmur server.
//!
//! Every option overrides the matching setting from the configuration file.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind_address: Option<String>,
    /// Optional override for the spatial index strategy
    pub index: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    pub fn parse() -> Self {
        Self::parse_from(std::env::args_os())
    }

    /// Parses the given argument list; the first item is the program name.
    pub fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = command().get_matches_from(args);

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            bind_address: matches.get_one::<String>("bind").cloned(),
            index: matches.get_one::<String>("index").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

fn command() -> Command {
    Command::new("Murmur Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Proximity-gated message broadcast over WebSockets")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 127.0.0.1:8080)"),
        )
        .arg(
            Arg::new("index")
                .short('i')
                .long("index")
                .value_name("KIND")
                .help("Spatial index (ball_tree, octree, quadtree, linear)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
}
