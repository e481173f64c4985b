//! Command-line interface for teleop-forge.
//!
//! Provides the `convert`, `inspect` and `play` commands.

mod commands;

pub use commands::{log_filter, parse_cli, run_with_cli, Cli, Commands};
