//! Shared helpers: version provider and terminal output

pub mod git_version;
pub mod terminal;
