//! Gobu.toml configuration parsing
//!
//! The configuration file is optional. It only controls which extra files
//! the `package` trait bundles next to the binary:
//!
//! ```toml
//! [package]
//! dist = ["README*", "LICENSE", "docs/*.md"]
//! ```
//!
//! The `GOBU_EXTRA_DIST` environment variable (space separated globs)
//! overrides the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Name of the optional configuration file in the working directory
pub const CONFIG_FILE: &str = "Gobu.toml";

/// Environment variable overriding the dist globs
pub const EXTRA_DIST_ENV: &str = "GOBU_EXTRA_DIST";

/// Files bundled when nothing else is configured
pub const DEFAULT_DIST: [&str; 2] = ["README*", "LICENSE"];

/// Root configuration from Gobu.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GobuConfig {
    /// Packaging settings
    #[serde(default)]
    pub package: PackageConfig,
}

/// `[package]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Globs of extra files to bundle, relative to the working directory
    pub dist: Option<Vec<String>>,
}

impl GobuConfig {
    /// Load `Gobu.toml` from `dir`; a missing file yields the defaults
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid {}", path.display()))
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse Gobu.toml")
    }

    /// Globs to bundle when packaging.
    ///
    /// Precedence: `env_override` (space separated), then `[package] dist`,
    /// then [`DEFAULT_DIST`]. An override without any glob counts as unset.
    pub fn dist_patterns(&self, env_override: Option<&str>) -> Vec<String> {
        if let Some(value) = env_override {
            let patterns: Vec<String> = value
                .split(' ')
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
            if !patterns.is_empty() {
                return patterns;
            }
        }

        match &self.package.dist {
            Some(dist) => dist.clone(),
            None => DEFAULT_DIST.iter().map(|p| p.to_string()).collect(),
        }
    }
}
