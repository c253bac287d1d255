//! Defines the command-line arguments and subcommands for the engine CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "sigmastat",
    version,
    about = "A statistical analysis engine with deterministic result validation."
)]
pub struct SigmaStatArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored human-readable report.
    Pretty,
    /// The raw envelope and validation report as JSON.
    Json,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full pipeline: execute a test, validate the result, review it.
    Run {
        /// Path to the dataset, a JSON array of row objects.
        #[arg(required = true)]
        dataset: PathBuf,

        /// Identifier of the test to run.
        #[arg(short, long, required = true)]
        test: String,

        /// Test configuration as inline JSON.
        #[arg(short, long, default_value = "{}")]
        config: String,

        /// Request identifier; defaults to a timestamp-derived id.
        #[arg(long)]
        request_id: Option<String>,

        /// Skip the plausibility review stage.
        #[arg(long)]
        no_review: bool,

        /// Reviewer deadline in milliseconds.
        #[arg(long, default_value_t = 2000)]
        review_timeout_ms: u64,

        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// List every test in the catalog.
    ListTests,
    /// Show the configuration schema and requirements of one test.
    Describe {
        /// Identifier of the test to describe.
        #[arg(required = true)]
        test: String,
    },
    /// Suggest applicable tests for a dataset.
    Recommend {
        /// Path to the dataset, a JSON array of row objects.
        #[arg(required = true)]
        dataset: PathBuf,
    },
}
