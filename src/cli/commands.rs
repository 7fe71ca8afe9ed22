//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - check-config: load and validate the configuration
//! - classify: show which lane a priority falls into
//! - simulate: replay a task file against a simulated clock

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Triagr - priority-based admission scheduler
#[derive(Parser, Debug)]
#[command(name = "triagr")]
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
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, validate and print the effective configuration
    CheckConfig,

    /// Print the lane a priority value falls into
    Classify {
        /// Priority value
        #[arg(allow_hyphen_values = true)]
        priority: i64,
    },

    /// Run a task file through the scheduler on a simulated clock
    Simulate {
        /// YAML file with a list of tasks
        #[arg(short, long)]
        tasks: PathBuf,

        /// Number of ticks to run
        #[arg(long, default_value_t = 10)]
        ticks: u32,

        /// Simulated milliseconds per tick
        #[arg(long, default_value_t = 60_000)]
        tick_ms: u64,

        /// Ticks a task runs before it is completed
        #[arg(long, default_value_t = 3)]
        run_ticks: u32,
    },
}
