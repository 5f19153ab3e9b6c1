//! Configuration management and validation.
//!
//! Provides the per-run pipeline settings and the application configuration
//! that wraps them. Configuration is layered: built-in defaults, then an
//! optional TOML file, then environment and command-line overrides, and is
//! validated once all layers are applied.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::app::models::{Domain, Granularity, PipelineMode};
use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BATCH_ROWS, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_SIZE,
    DEFAULT_OUTPUT_DIR, DEFAULT_PREVIEW_ROWS, DEFAULT_PROGRESS_INTERVAL_ROWS, MIN_CHUNK_SIZE,
    OUTPUT_DIR_ENV,
};
use crate::{Error, Result};

/// Settings for a single pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Telemetry domain of the uploaded file
    pub domain: Domain,

    /// Fail when the file's granularity differs from this one
    pub expected_granularity: Option<Granularity>,

    /// Aggregate into this granularity instead of the file's own
    pub target_granularity: Option<Granularity>,

    /// Aggregate rows into periods or convert them one by one
    pub mode: PipelineMode,

    /// Bytes requested from the input per read
    pub chunk_size: usize,

    /// Rows buffered before they are validated and aggregated
    pub batch_rows: usize,

    /// Capacity of the progress/result channel
    pub channel_capacity: usize,

    /// Emit a preview chunk every this many rows (0 disables previews)
    pub progress_interval_rows: usize,

    /// Maximum rows in one preview chunk
    pub preview_rows: usize,

    /// Map header aliases such as `Relative Humidity` to canonical names
    pub normalize_headers: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            domain: Domain::Solar,
            expected_granularity: None,
            target_granularity: None,
            mode: PipelineMode::Aggregate,
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_rows: DEFAULT_BATCH_ROWS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            progress_interval_rows: DEFAULT_PROGRESS_INTERVAL_ROWS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            normalize_headers: true,
        }
    }
}

impl PipelineConfig {
    /// Create configuration for a domain with default settings
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            ..Self::default()
        }
    }

    /// Set the telemetry domain
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Require the file to have this granularity
    pub fn with_expected_granularity(mut self, granularity: Granularity) -> Self {
        self.expected_granularity = Some(granularity);
        self
    }

    /// Roll up into a coarser granularity
    pub fn with_target_granularity(mut self, granularity: Granularity) -> Self {
        self.target_granularity = Some(granularity);
        self
    }

    /// Convert rows one by one instead of aggregating
    pub fn with_pass_through(mut self) -> Self {
        self.mode = PipelineMode::PassThrough;
        self
    }

    /// Set read chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set how many rows are validated and aggregated together
    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows;
        self
    }

    /// Set channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set preview cadence and size
    pub fn with_preview(mut self, interval_rows: usize, preview_rows: usize) -> Self {
        self.progress_interval_rows = interval_rows;
        self.preview_rows = preview_rows;
        self
    }

    /// Keep header titles exactly as written
    pub fn without_header_normalization(mut self) -> Self {
        self.normalize_headers = false;
        self
    }

    /// Validate settings that do not depend on the file
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::configuration(format!(
                "chunk_size must be at least {} bytes, got {}",
                MIN_CHUNK_SIZE, self.chunk_size
            )));
        }

        if self.batch_rows == 0 {
            return Err(Error::configuration("batch_rows must be positive"));
        }

        if self.channel_capacity == 0 {
            return Err(Error::configuration("channel_capacity must be positive"));
        }

        if let (Some(expected), Some(target)) = (self.expected_granularity, self.target_granularity)
        {
            if target < expected {
                return Err(Error::InvalidGranularityTarget {
                    detected: expected,
                    target,
                });
            }
        }

        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline settings applied to every file
    pub pipeline: PipelineConfig,

    /// Directory receiving exported datasets
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Config {
    /// Default configuration file location under the user config directory
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| Error::configuration(format!("Invalid configuration: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::io(
                format!("Failed to read configuration file {}", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&text)
    }

    /// Load defaults, then the config file, then environment overrides
    ///
    /// An explicit `config_file` must exist; the default location is used
    /// only when present.
    pub fn load_layered(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => match Self::default_config_path().filter(|path| path.is_file()) {
                Some(path) => {
                    debug!("Loading configuration from {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };

        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            if !dir.trim().is_empty() {
                debug!("Output directory overridden by {}: {}", OUTPUT_DIR_ENV, dir);
                config.output_dir = PathBuf::from(dir);
            }
        }

        Ok(config)
    }

    /// Replace the pipeline settings
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Set output directory
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Validate the fully layered configuration
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::configuration("output_dir must not be empty"));
        }
        self.pipeline.validate()
    }
}
