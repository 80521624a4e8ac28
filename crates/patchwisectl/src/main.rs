//! Patchwise Control - CLI for checking and applying updates

use clap::Parser;
use owo_colors::OwoColorize;
use patchwisectl::cli::Cli;
use patchwisectl::{commands, failure_label, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match commands::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} [{}] {:#}", "[ERROR]".bright_red(), failure_label(&e), e);
            ExitCode::FAILURE
        }
    }
}
