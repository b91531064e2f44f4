//! CLI command definitions using clap.
//!
//! - detect: decide whether input reveals a missing tool
//! - generate: validate, compile and register a source file as a tool
//! - synthesize: detect a need and have the model write the tool
//! - tools: list registered tools and their manifests

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ouroboros - a self-extending tool pipeline
#[derive(Parser, Debug)]
#[command(name = "ouroboros")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the tools output directory
    #[arg(long, global = true)]
    pub tools_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
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
    /// Detect whether the input reveals a missing tool
    Detect {
        /// Natural-language input to inspect
        input: String,

        /// Text of a previous failed attempt
        #[arg(short, long)]
        prior_failure: Option<String>,

        /// Skip the model and use pattern heuristics only
        #[arg(long)]
        offline: bool,
    },

    /// Validate, compile and register a source file as a tool
    Generate {
        /// Tool name
        name: String,

        /// Source file ("-" reads stdin)
        #[arg(short, long)]
        source: PathBuf,

        /// What the tool does
        #[arg(short = 'P', long, default_value = "")]
        purpose: String,

        /// Urgency estimate in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        priority: f64,

        /// Need validity estimate in [0, 1]
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,

        /// Check safety only; skip the toolchain and write nothing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Detect a need and have the model write, validate and compile the tool
    Synthesize {
        /// Natural-language input describing the gap
        input: String,

        /// Text of a previous failed attempt
        #[arg(short, long)]
        prior_failure: Option<String>,

        /// Check safety only; skip the toolchain and write nothing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// List registered tools
    Tools,
}
