// Git version information utilities

use std::path::Path;
use std::process::{Command, Stdio};

/// Arguments passed to `git describe` for the version string
const DESCRIBE_ARGS: [&str; 4] = ["describe", "--always", "--tags", "--dirty"];

/// Describe the revision checked out at `project_root`.
///
/// Returns the `git describe --always --tags --dirty` output, for example
/// `v1.2.3`, `v1.2.3-4-gdeadbee-dirty` or a bare short hash. An empty string
/// means no version is known: git is missing or `project_root` is not a
/// repository.
pub fn describe(project_root: &Path) -> String {
    let output = Command::new("git")
        .args(DESCRIBE_ARGS)
        .current_dir(project_root)
        .stderr(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => String::new(),
    }
}
