use clap::ArgMatches;
use colored::Colorize;
use commands::command_argument_builder;
use linkdigest::handlers::{handle_curate, handle_digest, handle_init, handle_status, init_tracing};
use linkdigest_core::print_banner;
use std::path::PathBuf;

mod commands;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet is set or the digest goes to stdout
    if !quiet && !writes_to_stdout(&chosen_command) {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        // No subcommand provided, just show the banner
        None => Ok(()),
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("curate", primary_command)) => handle_curate(primary_command, !quiet).await,
        Some(("digest", primary_command)) => handle_digest(primary_command),
        Some(("status", primary_command)) => handle_status(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

fn writes_to_stdout(matches: &ArgMatches) -> bool {
    matches!(
        matches.subcommand(),
        Some(("digest", sub)) if sub.get_one::<PathBuf>("output").is_none()
    )
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
