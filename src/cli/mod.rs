//! Command-line interface
//!
//! Argument parsing for the `goblock` binary.

pub mod commands;

pub use commands::{Command, Opt};
