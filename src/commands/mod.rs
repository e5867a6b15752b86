//! Command implementations
//!
//! `build` runs the trait pipeline; `list` and `licenses` are informational.

pub mod build;
pub mod licenses;
pub mod list;
