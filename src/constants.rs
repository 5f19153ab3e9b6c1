//! Application constants for the energy ingest pipeline
//!
//! This module contains the column names, timestamp patterns, defaults and
//! header aliases used throughout the pipeline.

// =============================================================================
// Time Columns and Timestamp Formats
// =============================================================================

/// Column names that may carry the timestamp of a row
pub const TIME_COLUMNS: &[&str] = &["date", "time", "week"];

/// Anchored timestamp patterns per granularity
pub mod timestamp_patterns {
    /// Daily timestamps: `YYYY-MM-DD`
    pub const DAILY: &str = r"^\d{4}-\d{2}-\d{2}$";

    /// Hourly timestamps land exactly on the hour: `YYYY-MM-DDTHH:00:00`
    pub const HOURLY: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:00:00$";

    /// ISO week timestamps: `YYYY-Www`
    pub const WEEKLY: &str = r"^\d{4}-W\d{2}$";
}

/// Example values quoted in timestamp error messages
pub mod timestamp_examples {
    pub const DAILY: &str = "2024-02-05";
    pub const HOURLY: &str = "2024-02-05T14:00:00";
    pub const WEEKLY: &str = "2024-W06";
}

// =============================================================================
// Telemetry Fields
// =============================================================================

/// Canonical column names for solar and wind telemetry
pub mod fields {
    pub const SOLAR_POWER: &str = "solar_power";
    pub const DHI: &str = "dhi";
    pub const DNI: &str = "dni";
    pub const GHI: &str = "ghi";
    pub const TEMPERATURE: &str = "temperature";
    pub const RELATIVE_HUMIDITY: &str = "relative_humidity";
    pub const SOLAR_ZENITH_ANGLE: &str = "solar_zenith_angle";

    pub const WIND_POWER: &str = "wind_power";
    pub const WIND_SPEED: &str = "wind_speed";
    pub const DEW_POINT: &str = "dew_point";
}

/// Header titles used by older telemetry exports, mapped to canonical names
///
/// Matching is case-insensitive after whitespace is collapsed to underscores,
/// so `Relative Humidity` and `RELATIVE_HUMIDITY` both resolve.
pub const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("dhi", fields::DHI),
    ("dni", fields::DNI),
    ("ghi", fields::GHI),
    ("temp", fields::TEMPERATURE),
    ("temperature", fields::TEMPERATURE),
    ("relative_humidity", fields::RELATIVE_HUMIDITY),
    ("humidity", fields::RELATIVE_HUMIDITY),
    ("solar_zenith_angle", fields::SOLAR_ZENITH_ANGLE),
    ("zenith_angle", fields::SOLAR_ZENITH_ANGLE),
    ("solar_power", fields::SOLAR_POWER),
    ("wind_power", fields::WIND_POWER),
    ("wind_speed", fields::WIND_SPEED),
    ("dew_point", fields::DEW_POINT),
];

// =============================================================================
// Pipeline Defaults
// =============================================================================

/// Bytes requested from the input stream per read
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Emit a preview chunk every this many tokenized rows
pub const DEFAULT_PROGRESS_INTERVAL_ROWS: usize = 10_000;

/// Maximum rows carried by one preview chunk
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Rows buffered before a batch is validated and aggregated
pub const DEFAULT_BATCH_ROWS: usize = 4096;

/// Capacity of the pipeline message channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Smallest accepted read size
pub const MIN_CHUNK_SIZE: usize = 64;

// =============================================================================
// Dataset Export
// =============================================================================

/// Generation stamp appended to suggested filenames
pub const FILENAME_STAMP_FORMAT: &str = "%Y_%m_%dT%H_%M_%S_%3fZ";

/// Extension of exported datasets
pub const DATASET_EXTENSION: &str = "json";

// =============================================================================
// Configuration
// =============================================================================

/// Directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "energy-ingest";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the output directory
pub const OUTPUT_DIR_ENV: &str = "ENERGY_INGEST_OUTPUT";

/// Default output directory for exported datasets
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
