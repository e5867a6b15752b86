//! gobu - Traitful go build
//!
//! Translates a short list of trait names into the flags, environment and
//! subcommand of a `go build` invocation, runs it, and optionally packages
//! the result into a zip archive.
//!
//! ## Architecture
//!
//! ```text
//! CLI → commands/build.rs → build/traits.rs → build/config.rs → exec/subprocess.rs
//!                                                   ↓
//!                                           build/archive.rs
//! ```

mod build;
mod cli;
mod commands;
mod config;
mod error;
mod exec;
mod utils;

use clap::Parser;

use cli::Cli;
use error::GobuError;
use utils::terminal::print_error;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli.execute() {
        match err.downcast_ref::<GobuError>() {
            Some(gobu_err) => gobu_err.display_with_hints(),
            None => print_error(&format!("{:#}", err)),
        }
        std::process::exit(1);
    }
}
