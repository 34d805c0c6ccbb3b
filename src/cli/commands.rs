//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - send: send a prompt to the configured model
//! - tools: print the built-in tool schemas
//! - validate-plan: check a tool chain plan against the registry
//! - run-plan: execute a tool chain plan

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tabpilot - streaming LLM client and tool orchestrator
#[derive(Parser, Debug)]
#[command(name = "tabpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a prompt to the configured model
    Send {
        /// Prompt text
        text: String,

        /// System instruction
        #[arg(short, long)]
        system: Option<String>,

        /// Wait for the full response instead of streaming
        #[arg(long)]
        no_stream: bool,
    },

    /// Print the built-in tool schemas as JSON
    Tools,

    /// Check that every step of a chain plan names a known tool with valid arguments
    ValidatePlan {
        /// JSON file holding a list of {tool, args} steps
        file: PathBuf,
    },

    /// Execute a chain plan, stopping at the first failed step
    RunPlan {
        /// JSON file holding a list of {tool, args} steps
        file: PathBuf,
    },
}
