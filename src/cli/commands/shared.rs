//! Shared components for CLI commands
//!
//! This module contains common types, utilities, and functions used across
//! multiple CLI command implementations.

use crate::Result;
use crate::cli::args::ProcessArgs;
use crate::config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

/// Processing statistics for reporting across all commands
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    /// Number of files that produced a dataset
    pub files_processed: usize,
    /// Number of files rejected by the pipeline
    pub files_failed: usize,
    /// Data rows read across all files
    pub rows_read: usize,
    /// Records written across all datasets
    pub records_written: usize,
    /// Total processing time
    pub processing_time: Duration,
    /// Output file sizes in bytes
    pub output_sizes: Vec<(String, u64)>,
}

impl ProcessingStats {
    /// Calculate total output size in bytes
    pub fn total_output_size(&self) -> u64 {
        self.output_sizes.iter().map(|(_, size)| size).sum()
    }

    /// True when at least one file was rejected
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0
    }

    /// Format output size in human-readable format
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", bytes, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

/// Set up structured logging on stderr
///
/// `RUST_LOG` takes precedence over `log_level`.
pub fn setup_logging(log_level: &str, compact: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("energy_ingest={}", log_level)));

    let result = if compact {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    match result {
        Ok(()) => debug!("Logging initialized at level: {}", log_level),
        Err(e) => debug!("Logging already initialized: {}", e),
    }
}

/// Load configuration using layered approach (file -> env -> args)
pub fn load_configuration(args: &ProcessArgs) -> Result<Config> {
    match &args.config_file {
        Some(path) => info!("Using config file: {}", path.display()),
        None => debug!(
            "No config file given, checking {:?}",
            Config::default_config_path()
        ),
    }

    let config = Config::load_layered(args.config_file.as_deref())?;
    let config = args.apply_overrides(config);
    config.validate()?;

    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Create a spinner for one file's pipeline run
pub fn create_spinner(prefix: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(prefix.to_string());
    spinner.set_message("starting");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
