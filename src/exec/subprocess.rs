//! Subprocess execution for the go tool

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::error::{hints, GobuError};

/// Result of a subprocess execution
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,

    /// Process exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,

    /// Execution duration
    pub duration: Duration,
}

impl CommandResult {
    /// Create a CommandResult from an exit status
    pub fn from_status(status: ExitStatus, duration: Duration) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code(),
            duration,
        }
    }
}

/// Split `KEY=value` entries; entries without `=` are ignored
pub fn parse_env(env: &[String]) -> Vec<(&str, &str)> {
    env.iter().filter_map(|entry| entry.split_once('=')).collect()
}

/// Run a command with extra environment assignments, sharing this process's
/// standard streams.
///
/// Assignments are applied in order on top of the inherited environment, so a
/// later entry for the same key wins. A program that cannot be found is
/// reported as a missing tool.
pub fn run_command(program: &str, args: &[String], env: &[String]) -> Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);
    for (key, value) in parse_env(env) {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::inherit());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());

    let status = cmd.status().map_err(|e| -> anyhow::Error {
        if e.kind() == ErrorKind::NotFound {
            GobuError::missing_tool(program, "building", hints::go()).into()
        } else {
            anyhow::Error::new(e).context(format!("Failed to execute {}", program))
        }
    })?;
    Ok(CommandResult::from_status(status, start.elapsed()))
}

/// Locate a program the way the child process spawn would
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
