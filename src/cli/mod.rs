//! CLI module for tabpilot - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for sending prompts and
//! inspecting the tool catalog.

pub mod commands;

pub use commands::Cli;
