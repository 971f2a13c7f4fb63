//! Command-line definition.

use clap::{Arg, ArgAction, Command};

/// Build the `dirstore` command tree.
pub fn build_cli() -> Command {
    Command::new("dirstore")
        .about("Inspect and recover dirstore data directories")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print machine-readable JSON"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Log more (repeat for trace output)"),
        )
        .subcommand(
            Command::new("journal")
                .about("List the transactions in a journal file")
                .arg(Arg::new("file").required(true).help("Journal file"))
                .arg(
                    Arg::new("objects")
                        .long("objects")
                        .action(ArgAction::SetTrue)
                        .help("Print the fields of created and edited objects"),
                ),
        )
        .subcommand(
            Command::new("dump")
                .about("Summarize a dump file")
                .arg(Arg::new("file").required(true).help("Dump file")),
        )
        .subcommand(
            Command::new("recover")
                .about("Open a store, replaying its dump and journal")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .required(true)
                        .help("TOML store configuration"),
                )
                .arg(
                    Arg::new("path")
                        .long("path")
                        .help("Data directory, overriding the configuration"),
                )
                .arg(
                    Arg::new("checkpoint")
                        .long("checkpoint")
                        .action(ArgAction::SetTrue)
                        .help("Write a fresh dump and reset the journal afterwards"),
                ),
        )
}
