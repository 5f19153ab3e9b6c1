//! Command-line argument definitions for energy-ingest
//!
//! This module defines the CLI interface using the clap derive API.

use crate::app::models::{Domain, Granularity};
use crate::config::Config;
use crate::{Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the energy telemetry ingester
///
/// Validates solar and wind telemetry CSV files and converts them into
/// normalized JSON datasets for forecast configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "energy-ingest",
    version,
    about = "Validate and aggregate solar/wind telemetry CSV files into JSON datasets",
    long_about = "Reads hourly, daily or weekly solar and wind telemetry exported as CSV, \
                  checks columns and timestamps against the domain schema, aggregates rows \
                  per period and writes the normalized records as a JSON dataset with a \
                  generated filename."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Process CSV files into JSON datasets
    Process(ProcessArgs),
    /// Show the registered schemas
    Schema(SchemaArgs),
}

/// Arguments for the process command
#[derive(Debug, Clone, Parser)]
pub struct ProcessArgs {
    /// CSV files to process, one pipeline run each
    #[arg(value_name = "FILES", required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Telemetry domain of the files
    ///
    /// One of solar, wind or combined. Overrides the configuration file.
    #[arg(
        short = 'd',
        long = "domain",
        value_name = "DOMAIN",
        help = "Telemetry domain: solar, wind or combined"
    )]
    pub domain: Option<Domain>,

    /// Expected granularity of the files
    ///
    /// Files whose time column implies another granularity are rejected.
    #[arg(
        short = 'e',
        long = "expect",
        value_name = "GRANULARITY",
        help = "Reject files that are not hourly, daily or weekly as given"
    )]
    pub expect: Option<Granularity>,

    /// Aggregate into a coarser granularity than the file's own
    #[arg(
        short = 'a',
        long = "aggregate-to",
        value_name = "GRANULARITY",
        help = "Roll up into daily or weekly periods",
        conflicts_with = "pass_through"
    )]
    pub aggregate_to: Option<Granularity>,

    /// Convert rows one by one instead of aggregating per period
    #[arg(long = "pass-through", help = "Convert rows 1:1 without aggregation")]
    pub pass_through: bool,

    /// Output directory for generated datasets
    ///
    /// Created if missing. Defaults to the configured output directory.
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Output directory for generated JSON datasets"
    )]
    pub output_path: Option<PathBuf>,

    /// Print datasets to stdout instead of writing files
    #[arg(long = "stdout", help = "Print datasets to stdout", conflicts_with = "output_path")]
    pub stdout: bool,

    /// Path to configuration file
    ///
    /// TOML configuration file. If not specified, looks for
    /// energy-ingest/config.toml under the user configuration directory.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Arguments for the schema command
#[derive(Debug, Clone, Parser)]
pub struct SchemaArgs {
    /// Only show schemas of this domain
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN")]
    pub domain: Option<Domain>,

    /// Output format
    #[arg(
        long = "format",
        value_enum,
        default_value = "human",
        help = "Output format for the schema listing"
    )]
    pub output_format: OutputFormat,

    /// Enable verbose logging output
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Enable verbose logging (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}

/// Map a `-v` count to a log level
fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

impl ProcessArgs {
    /// Validate the process command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        for file in &self.files {
            if !file.is_file() {
                return Err(Error::configuration(format!(
                    "Input file does not exist: {}",
                    file.display()
                )));
            }
        }

        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(Error::configuration(format!(
                    "Config file does not exist: {}",
                    config_file.display()
                )));
            }
        }

        Ok(())
    }

    /// Apply command-line overrides on top of the layered configuration
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(domain) = self.domain {
            config.pipeline.domain = domain;
        }
        if let Some(expected) = self.expect {
            config.pipeline.expected_granularity = Some(expected);
        }
        if let Some(target) = self.aggregate_to {
            config.pipeline.target_granularity = Some(target);
        }
        if self.pass_through {
            config.pipeline = config.pipeline.with_pass_through();
        }
        if let Some(output_path) = &self.output_path {
            config.output_dir = output_path.clone();
        }
        config
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            level_for(self.verbose)
        }
    }

    /// Check if we should show progress spinners (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

impl SchemaArgs {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        level_for(self.verbose)
    }
}
