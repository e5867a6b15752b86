//! Build command implementation

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::build::archive::{archive_entries, create_package, PackageSpec};
use crate::build::{BuildConfig, Invocation, TraitRegistry};
use crate::config::GobuConfig;
use crate::error::GobuError;
use crate::exec::subprocess::{resolve_program, run_command};
use crate::utils::git_version;
use crate::utils::terminal::{print_info, print_section, print_success};

/// Trait applied when none are requested
pub const DEFAULT_TRAIT: &str = "default";

/// Binary name used when the working directory has no file name (e.g. `/`)
const FALLBACK_NAME: &str = "main";

/// Resolved traits and the command they produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Base names in application order
    pub traits: Vec<String>,
    /// Command line and environment for the go tool
    #[serde(flatten)]
    pub invocation: Invocation,
}

/// Build the Go package in the current directory
#[derive(Debug, Default)]
pub struct BuildCommand {
    /// Trait tokens, `name` or `name=value`
    pub traits: Vec<String>,

    /// Print the plan and stop before running anything
    pub dry_run: bool,

    /// Print the plan as JSON, even without debug output
    pub json: bool,

    /// Space separated globs overriding the dist files
    pub extra_dist: Option<String>,
}

/// Substitute the default trait for an empty request
pub fn with_default(tokens: Vec<String>) -> Vec<String> {
    if tokens.is_empty() {
        vec![DEFAULT_TRAIT.to_string()]
    } else {
        tokens
    }
}

/// Validate and apply `tokens` against `config`
pub fn plan(
    registry: &mut TraitRegistry,
    config: &mut BuildConfig,
    tokens: &[String],
) -> Result<Plan, GobuError> {
    registry.validate(tokens)?;
    registry.apply(config, tokens)?;
    Ok(Plan {
        traits: registry.applied_names().to_vec(),
        invocation: config.render(),
    })
}

/// Base name of `dir`, the go tool's default binary name
pub fn default_binary_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

impl BuildCommand {
    /// Execute the build command
    pub fn execute(self, debug: bool) -> Result<()> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;

        let version = git_version::describe(&current_dir);
        let mut config = BuildConfig::new(version, default_binary_name(&current_dir));
        let mut registry = TraitRegistry::builtin()?;

        let tokens = with_default(self.traits.clone());
        let plan = plan(&mut registry, &mut config, &tokens)?;

        // Status lines go to stderr; stdout only carries the plan
        if debug || self.dry_run || self.json {
            self.print_plan(&plan)?;
        }
        if self.dry_run {
            return Ok(());
        }

        let invocation = &plan.invocation;
        if debug {
            if let Some(path) = resolve_program(invocation.program()) {
                print_info(&format!("Using {}", path.display()));
            }
        }

        let result = run_command(invocation.program(), invocation.args(), &invocation.env)?;
        if !result.success {
            return Err(GobuError::BuildFailure {
                command: invocation.command.join(" "),
                exit_code: result.exit_code,
            }
            .into());
        }
        if debug {
            print_info(&format!("Build finished in {:.2?}", result.duration));
        }

        if config.package_requested() {
            self.package(&config, &current_dir, debug)?;
        }

        Ok(())
    }

    fn print_plan(&self, plan: &Plan) -> Result<()> {
        if self.json {
            let json = serde_json::to_string_pretty(plan).context("Failed to serialize plan")?;
            println!("{}", json);
        } else {
            print_section("Traits", [plan.traits.join(" ")]);
            print_section("Command", [plan.invocation.command.join(" ")]);
            print_section("Environment", &plan.invocation.env);
        }
        Ok(())
    }

    fn package(&self, config: &BuildConfig, dir: &Path, debug: bool) -> Result<()> {
        let settings = GobuConfig::load_from_dir(dir)?;
        let patterns = settings.dist_patterns(self.extra_dist.as_deref());
        let spec = PackageSpec::from_config(config, patterns);

        let archive = create_package(&spec, dir).map_err(|e| match e.downcast::<GobuError>() {
            Ok(err) => err,
            Err(e) => GobuError::Package {
                message: spec.archive_name(),
                source: Some(e),
                hint: None,
            },
        })?;

        print_success(&format!("Created {}", archive.display()));
        if debug {
            print_info("Package contents:");
            for entry in archive_entries(&archive)? {
                eprintln!("  {}", entry);
            }
        }
        Ok(())
    }
}
