//! CLI module for ouroboros - command-line interface and subcommands.
//!
//! Provides subcommands for need detection, tool generation from source,
//! end-to-end synthesis and listing registered tools.

pub mod commands;

pub use commands::Cli;
