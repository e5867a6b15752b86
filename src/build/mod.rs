//! Trait resolution and go command assembly
//!
//! ## Architecture
//!
//! ```text
//! trait tokens → traits.rs (validate, apply) → config.rs (BuildConfig) → Invocation
//!                                                        ↓
//!                                             archive.rs (zip package)
//! ```
//!
//! ## Modules
//!
//! - `config` - Mutable accumulator of flags, environment and build mode
//! - `traits` - Trait registry: validation, composite expansion, at-most-once application
//! - `archive` - ZIP packaging of the built binary and dist files

pub mod archive;
pub mod config;
pub mod traits;

pub use config::{BuildConfig, Invocation};
pub use traits::TraitRegistry;

/// Environment variable selecting the target operating system
pub const OS_ENV_KEY: &str = "GOOS";

/// Placeholder in the `name=` template replaced by the default binary name
pub const NAME_PLACEHOLDER: &str = "%n";

/// Host operating system in Go naming (`GOOS` values)
pub fn host_os() -> &'static str {
    go_os_name(std::env::consts::OS)
}

/// Host architecture in Go naming (`GOARCH` values)
pub fn host_arch() -> &'static str {
    go_arch_name(std::env::consts::ARCH)
}

fn go_os_name(os: &'static str) -> &'static str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn go_arch_name(arch: &'static str) -> &'static str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "s390x" => "s390x",
        other => other,
    }
}
