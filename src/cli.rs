//! CLI argument parsing using clap derive macros

use anyhow::Result;
use clap::Parser;

use crate::build::{host_arch, host_os};
use crate::commands::{build::BuildCommand, licenses, list};
use crate::config::EXTRA_DIST_ENV;

/// gobu - Traitful go build
///
/// Compose a 'go build' invocation from named traits. Without traits the
/// 'default' trait is used. Run with -l to see the available traits.
#[derive(Parser, Debug)]
#[command(name = "gobu")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Display version
    #[arg(short = 'v', long = "version")]
    pub show_version: bool,

    /// List traits
    #[arg(short = 'l', long = "list")]
    pub list_traits: bool,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Don't actually run any commands. Implies '-d'.
    #[arg(long = "dryrun")]
    pub dry_run: bool,

    /// Print the resolved traits and command as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Show licenses of gobu
    #[arg(long)]
    pub licenses: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Space separated globs of extra files to package
    #[arg(long, env = EXTRA_DIST_ENV, value_name = "GLOBS")]
    pub extra_dist: Option<String>,

    /// Traits to apply: NAME or NAME=VALUE
    #[arg(value_name = "TRAIT")]
    pub traits: Vec<String>,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        // Set up terminal colors
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        if self.show_version {
            println!("{}", version_string());
            return Ok(());
        }
        if self.licenses {
            licenses::execute();
            return Ok(());
        }
        if self.list_traits {
            return list::execute();
        }

        let command = BuildCommand {
            traits: self.traits,
            dry_run: self.dry_run,
            json: self.json,
            extra_dist: self.extra_dist,
        };
        command.execute(self.debug)
    }
}

/// Program name, version and the platform it runs on
pub fn version_string() -> String {
    format!(
        "gobu {} ({}/{})",
        env!("CARGO_PKG_VERSION"),
        host_os(),
        host_arch()
    )
}
