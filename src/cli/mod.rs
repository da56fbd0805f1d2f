//! Command-line interface for pipewright.
//!
//! Provides commands for building the pipeline image, launching it, and
//! auditing the build-and-launch contract offline.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
