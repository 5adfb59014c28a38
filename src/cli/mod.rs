//! Command-line interface
//!
//! Kept out of the library re-exports so CLI concerns never leak into
//! library consumers; only the binary reaches in here.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
pub use commands::{handle_download, handle_info};
