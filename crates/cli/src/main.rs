//! dirstore CLI: inspect journals and dumps, recover a data directory.
//!
//! - `dirstore journal FILE [--objects]`: list the transactions in a journal
//! - `dirstore dump FILE`: summarize a dump file
//! - `dirstore recover --config FILE [--path DIR] [--checkpoint]`: open a
//!   store, replaying dump and journal, and report what was loaded
//!
//! `--json` switches every command to JSON output; `-v` raises the log level.

mod commands;
mod format;

use std::path::Path;
use std::process;

use clap::ArgMatches;
use dirstore_durability::{read_dump, scan_file};
use dirstore_engine::{Store, StoreBuilder, StoreConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_dump, format_error, format_journal, format_recovery, BaseCount, OutputMode};

fn main() {
    let matches = build_cli().get_matches();

    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    init_logging(matches.get_count("verbose"));

    match run(&matches, output_mode) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, output_mode));
            process::exit(1);
        }
    }
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(matches: &ArgMatches, mode: OutputMode) -> Result<String, String> {
    match matches.subcommand() {
        Some(("journal", sub)) => {
            let file = required(sub, "file")?;
            let scan = scan_file(Path::new(file))
                .map_err(|e| format!("Failed to read journal {}: {}", file, e))?;
            Ok(format_journal(&scan, sub.get_flag("objects"), mode))
        }
        Some(("dump", sub)) => {
            let file = required(sub, "file")?;
            let image =
                read_dump(Path::new(file)).map_err(|e| format!("Failed to read dump {}: {}", file, e))?;
            Ok(format_dump(&image, mode))
        }
        Some(("recover", sub)) => recover(sub, mode),
        _ => Err("No command provided".to_string()),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, String> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument '{}'", name))
}

fn recover(matches: &ArgMatches, mode: OutputMode) -> Result<String, String> {
    let config_file = required(matches, "config")?;
    let config = StoreConfig::from_toml_file(config_file).map_err(|e| e.to_string())?;
    debug!(
        config = config_file,
        bases = config.bases.len(),
        namespaces = config.namespaces.len(),
        "Loaded configuration"
    );

    let mut builder = StoreBuilder::from_config(config);
    if let Some(path) = matches.get_one::<String>("path") {
        builder = builder.path(path);
    }
    if builder.data_dir().is_none() {
        return Err("configuration names no data directory; pass --path".to_string());
    }

    let store: Store = builder
        .open()
        .map_err(|e| format!("Failed to open store: {}", e))?;

    let bases: Vec<BaseCount> = store
        .bases()
        .all()
        .iter()
        .map(|b| BaseCount {
            id: b.type_id().0,
            name: b.name().to_string(),
            objects: b.len(),
            max_id: b.max_id().0,
        })
        .collect();
    let report = format_recovery(store.recovery(), &bases, mode);

    if matches.get_flag("checkpoint") {
        let objects = store
            .dump()
            .map_err(|e| format!("Failed to write dump: {}", e))?;
        info!(objects, "Checkpoint written");
    }
    Ok(report)
}
