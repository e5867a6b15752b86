//! Build configuration accumulated from applied traits
//!
//! A [`BuildConfig`] holds everything the go tool invocation is assembled
//! from. Flag lists only grow, or are wholly reset by the explicit override
//! traits (`ldflags=`, `buildflags=`, `gcflags=`). Scalars such as the
//! subcommand and tool binary are last-write-wins.

use std::fmt;

use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;

use super::{host_arch, host_os, NAME_PLACEHOLDER, OS_ENV_KEY};
use crate::utils::terminal::print_warning;

/// Tool binary used when no `go=` trait was applied
pub const DEFAULT_TOOL: &str = "go";

/// go subcommand to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Subcommand {
    #[default]
    Build,
    Install,
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subcommand::Build => write!(f, "build"),
            Subcommand::Install => write!(f, "install"),
        }
    }
}

/// Rendered command line and environment assignments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// `KEY=value` entries in assignment order
    pub env: Vec<String>,
}

impl Invocation {
    /// Program to execute
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or(DEFAULT_TOOL)
    }

    /// Arguments after the program
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }
}

/// Mutable accumulator for one gobu invocation
#[derive(Debug, Clone)]
pub struct BuildConfig {
    link_flags: Vec<String>,
    build_flags: Vec<String>,
    compile_flags: Vec<String>,
    environment: Vec<String>,
    given_os: Option<String>,
    subcommand: Subcommand,
    tool: Option<String>,
    output_name: Option<String>,
    package_requested: bool,
    version: String,
    default_name: String,
    build_time: DateTime<Local>,
}

impl BuildConfig {
    /// Create a configuration for `version` building a binary named `default_name`
    pub fn new(version: impl Into<String>, default_name: impl Into<String>) -> Self {
        Self {
            link_flags: Vec::new(),
            build_flags: Vec::new(),
            compile_flags: Vec::new(),
            environment: Vec::new(),
            given_os: None,
            subcommand: Subcommand::default(),
            tool: None,
            output_name: None,
            package_requested: false,
            version: version.into(),
            default_name: default_name.into(),
            build_time: Local::now(),
        }
    }

    pub fn add_link_flags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.link_flags.extend(flags.into_iter().map(Into::into));
    }

    pub fn add_build_flags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_flags.extend(flags.into_iter().map(Into::into));
    }

    pub fn add_compile_flags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compile_flags.extend(flags.into_iter().map(Into::into));
    }

    pub fn reset_link_flags(&mut self) {
        self.link_flags.clear();
    }

    pub fn reset_build_flags(&mut self) {
        self.build_flags.clear();
    }

    pub fn reset_compile_flags(&mut self) {
        self.compile_flags.clear();
    }

    /// Inject a string variable into the binary at link time (`-X name=value`)
    pub fn add_var(&mut self, name: &str, value: &str) {
        self.add_link_flags(["-X".to_string(), format!("{}={}", name, value)]);
    }

    /// Record an environment assignment for the build command.
    ///
    /// The assignment is also mirrored into this process's environment so
    /// that anything run afterwards from here (the version provider, the
    /// packager, the go tool itself) observes the same target. Mirroring is
    /// best-effort: an assignment the platform cannot represent is reported
    /// as a warning and still recorded for the build command.
    pub fn set_env(&mut self, key: &str, value: &str) {
        self.environment.push(format!("{}={}", key, value));
        if key == OS_ENV_KEY {
            self.given_os = Some(value.to_string());
        }

        if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
            print_warning(&format!(
                "Failed to set environment variable {}={}: invalid name or value",
                key, value
            ));
            return;
        }
        std::env::set_var(key, value);
    }

    /// Target operating system, falling back to the host OS
    pub fn target_os(&self) -> &str {
        self.given_os.as_deref().unwrap_or(host_os())
    }

    /// Target architecture (always the host architecture)
    pub fn target_arch(&self) -> &str {
        host_arch()
    }

    pub fn set_subcommand(&mut self, subcommand: Subcommand) {
        self.subcommand = subcommand;
    }

    pub fn set_tool(&mut self, tool: impl Into<String>) {
        self.tool = Some(tool.into());
    }

    pub fn tool(&self) -> &str {
        self.tool.as_deref().unwrap_or(DEFAULT_TOOL)
    }

    /// Set the output name template; `%n` stands for the default name
    pub fn set_output_name(&mut self, template: impl Into<String>) {
        self.output_name = Some(template.into());
    }

    pub fn request_package(&mut self) {
        self.package_requested = true;
    }

    pub fn package_requested(&self) -> bool {
        self.package_requested
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build timestamp in RFC 3339 form, second precision
    pub fn timestamp(&self) -> String {
        self.build_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Binary name after applying the output template
    pub fn binary_name(&self) -> String {
        match &self.output_name {
            Some(template) => template.replace(NAME_PLACEHOLDER, &self.default_name),
            None => self.default_name.clone(),
        }
    }

    /// Render the go command and its environment from the current state
    pub fn render(&self) -> Invocation {
        let mut command = vec![self.tool().to_string(), self.subcommand.to_string()];
        command.extend(self.build_flags.iter().cloned());

        if !self.link_flags.is_empty() {
            command.push("-ldflags".to_string());
            command.push(self.link_flags.join(" "));
        }

        if !self.compile_flags.is_empty() {
            command.push("-gcflags".to_string());
            command.push(self.compile_flags.join(" "));
        }

        Invocation {
            command,
            env: self.environment.clone(),
        }
    }
}

/// Inspection helpers for tests of code that drives a `BuildConfig`
#[cfg(test)]
impl BuildConfig {
    /// Pin the timestamp injected by the `version` trait
    pub fn with_build_time(mut self, build_time: DateTime<Local>) -> Self {
        self.build_time = build_time;
        self
    }

    pub fn subcommand(&self) -> Subcommand {
        self.subcommand
    }

    pub fn link_flags(&self) -> &[String] {
        &self.link_flags
    }

    pub fn build_flags(&self) -> &[String] {
        &self.build_flags
    }

    pub fn compile_flags(&self) -> &[String] {
        &self.compile_flags
    }

    pub fn environment(&self) -> &[String] {
        &self.environment
    }
}
