//! Command-line interface for lessonforge.
//!
//! Provides commands for generating lesson packages and inspecting the
//! configured quality gates.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
