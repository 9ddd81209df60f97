//! Entry point: `meson`-compat argv translation, then `clap` parsing,
//! then dispatch; every error funnels through one exit-code mapping.

mod breakpoint;
mod cli;
mod commands;
mod error;
mod eval;
mod meson_compat;
mod persist;

use clap::Parser;
use colored::Colorize;

use cli::Cli;
use meson_compat::Dispatch;

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let argv: Vec<String> = std::env::args().collect();
    let dispatch = match meson_compat::translate(&argv) {
        Ok(dispatch) => dispatch,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            std::process::exit(1);
        }
    };

    let argv = match dispatch {
        Dispatch::Handled => std::process::exit(0),
        Dispatch::Native(argv) => argv,
    };

    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    if let Err(err) = commands::dispatch(cli.command) {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}
