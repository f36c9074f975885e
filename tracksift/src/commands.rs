use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/tracksift/";
pub const DEFAULT_DB_PATH: &str = "~/.config/tracksift/tracksift.db";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("tracksift")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("tracksift")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the tracksift capture database and default filter policy")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to store the capture database in")
                        .default_value(DEFAULT_CONFIG_DIR),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing database and policy without asking")
                        .required(false),
                ),
        )
        .subcommand(
            command!("replay")
                .about("Replay capture files through the request filter into the capture database")
                .arg(
                    arg!(-c --"capture" <PATH>)
                        .required(true)
                        .help("Capture file (JSON Lines) or directory of .jsonl files; repeatable")
                        .num_args(1..)
                        .action(clap::ArgAction::Append)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Capture database location")
                        .default_value(DEFAULT_DB_PATH),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Number of capture files replayed concurrently")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(-p --"policy" <FILE>)
                        .required(false)
                        .help("JSON filter policy overriding the default heuristics")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-l --"logs" <DIR>)
                        .required(false)
                        .help("Also write raw behavior and network CSV logs for every stored session")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("features")
                .about("Aggregate stored sessions into the behavior and network feature tables")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Capture database location")
                        .default_value(DEFAULT_DB_PATH),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(true)
                        .help("Directory the two feature CSV files are written to")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-p --"policy" <FILE>)
                        .required(false)
                        .help("JSON filter policy (thresholds used by the network features)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"complete-only")
                        .required(false)
                        .help("Leave out sessions that were cut short")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("merge")
                .about("Join the behavior table onto the network table by session start URL")
                .arg(
                    arg!(-b --"behavior" <FILE>)
                        .required(true)
                        .help("Behavior feature CSV")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-n --"network" <FILE>)
                        .required(true)
                        .help("Network feature CSV")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <FILE>)
                        .required(true)
                        .help("Merged feature CSV")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Diagnostics report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-r --"report" <FILE>)
                        .required(false)
                        .help("Save the diagnostics report to a file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("dataset")
                .about("Check that a merged, labeled table is usable as a training set")
                .arg(
                    arg!(-i --"input" <FILE>)
                        .required(true)
                        .help("Merged feature CSV with a label column")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-l --"label" <COLUMN>)
                        .required(false)
                        .help("Name of the label column")
                        .default_value("manual_label"),
                ),
        )
}
