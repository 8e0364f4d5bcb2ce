use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("linkdigest")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("linkdigest")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log debug output to stderr").required(false))
        .arg(
            arg!(-d --"data-dir" <PATH>)
                .required(false)
                .global(true)
                .help("Directory holding the ledger and configuration lists")
                .default_value("~/.config/linkdigest/"),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Settings file (default: linkdigest.toml in the data directory)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the data directory with empty lists and default settings")
                .arg(
                    arg!(-f --"force")
                        .help(
                            "Overwrites the settings file with defaults and clears the existing \
                        ledger.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("curate")
                .about(
                    "Reads one feed batch, admits popular links, enriches them and hands them \
                to the configured posters.",
                )
                .arg(
                    arg!(-F --"feed-file" <PATH>)
                        .required(false)
                        .help("JSON file with mentions or timeline pages")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("feed-url"),
                )
                .arg(
                    arg!(-u --"feed-url" <URL>)
                        .required(false)
                        .help("URL serving mentions or timeline pages as JSON")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("feed-file"),
                )
                .arg(
                    arg!(-t --"threshold" <COUNT>)
                        .required(false)
                        .help("Mentions needed before a link is posted (default: 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"backend" <BACKEND>)
                        .required(false)
                        .help("Ledger backend")
                        .value_parser(["files", "sqlite"]),
                )
                .arg(
                    arg!(--"dry-run")
                        .required(false)
                        .help("Show what would be admitted without saving or posting")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("digest")
                .about("Clusters the most recently posted links and writes them as JSON")
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the digest to a file (default: stdout)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-s --"sim-threshold" <SCORE>)
                        .required(false)
                        .help("Similarity a link needs to join a cluster, exclusive (default: 0.15)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(-m --"max-clusters" <COUNT>)
                        .required(false)
                        .help("Maximum number of clusters (default: 10)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-w --"display-window" <COUNT>)
                        .required(false)
                        .help("Most recent posted links to cluster (default: 50)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"corpus-window" <COUNT>)
                        .required(false)
                        .help("Most recent posted links the model is fitted on (default: 500)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"member-order" <ORDER>)
                        .required(false)
                        .help("Ordering inside a cluster")
                        .value_parser(["newest-first", "seed-first"]),
                )
                .arg(
                    arg!(--"tokenizer" <POLICY>)
                        .required(false)
                        .help("Words used for similarity")
                        .value_parser(["capitalized", "all-words"]),
                )
                .arg(
                    arg!(--"backend" <BACKEND>)
                        .required(false)
                        .help("Ledger backend")
                        .value_parser(["files", "sqlite"]),
                ),
        )
        .subcommand(
            command!("status")
                .about("Shows ledger sizes and the most recently posted links")
                .arg(
                    arg!(-n --"limit" <COUNT>)
                        .required(false)
                        .help("Number of recent links to list")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"backend" <BACKEND>)
                        .required(false)
                        .help("Ledger backend")
                        .value_parser(["files", "sqlite"]),
                ),
        )
}
