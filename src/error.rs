//! Error types and helpers for user-friendly error messages
//!
//! Engine errors ([`TraitError`]) are plain values; this module wraps the
//! failures that end a run together with an actionable hint.

use thiserror::Error;

use crate::build::traits::TraitError;

/// Failures that terminate a gobu run
#[derive(Error, Debug)]
pub enum GobuError {
    /// Requested trait names are not registered
    #[error("Parsing command line failed: {source}")]
    InvalidTraits {
        #[source]
        source: TraitError,
    },

    /// Tool/executable not found or not runnable
    #[error("Missing tool: {tool}")]
    MissingTool {
        tool: String,
        required_for: String,
        hint: String,
    },

    /// The go tool ran and failed
    #[error("Build failed: '{command}' exited with {}", exit_description(.exit_code))]
    BuildFailure {
        command: String,
        exit_code: Option<i32>,
    },

    /// Writing the distribution archive failed
    #[error("Creating package failed: {message}")]
    Package {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        hint: Option<String>,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl GobuError {
    /// Create a missing tool error
    pub fn missing_tool(
        tool: impl Into<String>,
        required_for: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::MissingTool {
            tool: tool.into(),
            required_for: required_for.into(),
            hint: hint.into(),
        }
    }

    /// Create a package error with an optional hint
    pub fn package_error(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::Package {
            message: message.into(),
            source: None,
            hint,
        }
    }

    /// Display error with formatting and hints
    pub fn display_with_hints(&self) {
        use console::style;

        eprintln!("{} {}", style("ERROR:").red().bold(), self);

        match self {
            GobuError::InvalidTraits { .. } => {
                eprintln!("\n{} {}", style("HINT:").yellow().bold(), hints::list_traits());
            }
            GobuError::MissingTool {
                hint, required_for, ..
            } => {
                eprintln!("Required for: {}", required_for);
                eprintln!("\n{} {}", style("HINT:").yellow().bold(), hint);
            }
            GobuError::Package { hint, source, .. } => {
                if let Some(source) = source {
                    eprintln!("  caused by: {:#}", source);
                }
                if let Some(h) = hint {
                    eprintln!("\n{} {}", style("HINT:").yellow().bold(), h);
                }
            }
            GobuError::BuildFailure { .. } => {}
        }
    }
}

impl From<TraitError> for GobuError {
    fn from(source: TraitError) -> Self {
        GobuError::InvalidTraits { source }
    }
}

/// Common error hints
pub mod hints {
    /// Get hint for missing Go
    pub fn go() -> &'static str {
        "Install Go from https://go.dev/dl/ or use your package manager:\n\
         • macOS: brew install go\n\
         • Ubuntu: sudo apt install golang\n\
         • Windows: winget install GoLang.Go\n\
         \n\
         Or point gobu at a specific binary with the go=<path> trait."
    }

    /// Get hint for invalid trait names
    pub fn list_traits() -> &'static str {
        "Run 'gobu -l' to list the available traits."
    }

    /// Get hint for a binary missing at packaging time
    pub fn binary_not_found(binary: &str) -> String {
        format!(
            "The built binary '{}' was not found in the current directory.\n\
             'package' expects 'go build' output; it cannot be combined with 'install'.",
            binary
        )
    }
}
