//! Core data models for energy telemetry ingestion
//!
//! This module defines the domain and granularity enumerations, the schema
//! shape, raw and aggregated records, the typed per-domain output records and
//! the terminal outcome of a pipeline run.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::{fields, timestamp_examples};
use crate::{Error, Result};

/// Telemetry category of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Solar,
    Wind,
    Combined,
}

impl Domain {
    /// All supported domains
    pub const ALL: [Domain; 3] = [Domain::Solar, Domain::Wind, Domain::Combined];

    /// Lowercase label used in filenames and messages
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Solar => "solar",
            Domain::Wind => "wind",
            Domain::Combined => "combined",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solar" => Ok(Domain::Solar),
            "wind" => Ok(Domain::Wind),
            "combined" | "both" => Ok(Domain::Combined),
            other => Err(Error::configuration(format!(
                "Unknown domain '{}'. Expected one of: solar, wind, combined",
                other
            ))),
        }
    }
}

/// Time bucket size of a dataset
///
/// Variants are ordered from finest to coarsest so that roll-up targets can
/// be compared directly (`Hourly < Daily < Weekly`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
}

impl Granularity {
    /// All supported granularities
    pub const ALL: [Granularity; 3] = [Granularity::Hourly, Granularity::Daily, Granularity::Weekly];

    /// Lowercase label used in filenames and messages
    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
        }
    }

    /// Column carrying timestamps of this granularity
    pub fn time_field(&self) -> TimeField {
        match self {
            Granularity::Hourly => TimeField::Time,
            Granularity::Daily => TimeField::Date,
            Granularity::Weekly => TimeField::Week,
        }
    }

    /// Example timestamp quoted in validation errors
    pub fn expected_example(&self) -> &'static str {
        match self {
            Granularity::Hourly => timestamp_examples::HOURLY,
            Granularity::Daily => timestamp_examples::DAILY,
            Granularity::Weekly => timestamp_examples::WEEKLY,
        }
    }

    /// Prefix of suggested dataset filenames (`hourly_`, `daily_`, `weekly_`)
    pub fn filename_prefix(&self) -> String {
        format!("{}_", self.label())
    }

    /// Parse a timestamp of this granularity into the start of its period
    ///
    /// Returns `None` for values that do not name a real calendar instant,
    /// even when they are shaped correctly (`2024-02-30`, `2024-W54`).
    pub fn parse_period_start(&self, value: &str) -> Option<NaiveDateTime> {
        match self {
            Granularity::Hourly => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok(),
            Granularity::Daily => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
            Granularity::Weekly => {
                let (year, week) = value.split_once("-W")?;
                let year = year.parse::<i32>().ok()?;
                let week = week.parse::<u32>().ok()?;
                NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?.and_hms_opt(0, 0, 0)
            }
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Ok(Granularity::Hourly),
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            other => Err(Error::configuration(format!(
                "Unknown granularity '{}'. Expected one of: hourly, daily, weekly",
                other
            ))),
        }
    }
}

/// The header column that designates a row's timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeField {
    Date,
    Time,
    Week,
}

impl TimeField {
    /// Column name in the CSV header
    pub fn column_name(&self) -> &'static str {
        match self {
            TimeField::Date => "date",
            TimeField::Time => "time",
            TimeField::Week => "week",
        }
    }

    /// Granularity implied by this column
    pub fn granularity(&self) -> Granularity {
        match self {
            TimeField::Date => Granularity::Daily,
            TimeField::Time => Granularity::Hourly,
            TimeField::Week => Granularity::Weekly,
        }
    }

    /// Resolve a header column name
    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            "date" => Some(TimeField::Date),
            "time" => Some(TimeField::Time),
            "week" => Some(TimeField::Week),
            _ => None,
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// How a numeric column is reduced within one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Cumulative quantity: unparseable cells count as zero
    Sum,
    /// Sampled quantity: unparseable cells are excluded from the mean
    Mean,
}

/// A required numeric column and its reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub reduction: Reduction,
}

impl FieldSpec {
    pub const fn sum(name: &'static str) -> Self {
        Self {
            name,
            reduction: Reduction::Sum,
        }
    }

    pub const fn mean(name: &'static str) -> Self {
        Self {
            name,
            reduction: Reduction::Mean,
        }
    }
}

/// Column set and timestamp format for one domain × granularity pair
///
/// `fields` never contains the time column; its order is the output order.
#[derive(Debug, Clone)]
pub struct Schema {
    pub domain: Domain,
    pub granularity: Granularity,
    pub time_field: TimeField,
    pub time_regex: Regex,
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Names of all required numeric columns
    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }

    /// Columns reduced by summation
    pub fn summed_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| field.reduction == Reduction::Sum)
            .map(|field| field.name)
    }

    /// Columns reduced by mean
    pub fn averaged_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| field.reduction == Reduction::Mean)
            .map(|field| field.name)
    }

    /// Check a raw value against the anchored timestamp pattern
    pub fn matches_timestamp(&self, value: &str) -> bool {
        self.time_regex.is_match(value)
    }

    /// Example timestamp for error messages
    pub fn expected_example(&self) -> &'static str {
        self.granularity.expected_example()
    }
}

/// Whether the pipeline groups rows into periods or converts them one by one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    #[default]
    Aggregate,
    PassThrough,
}

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Idle,
    Tokenizing,
    Validating,
    Aggregating,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Tokenizing => "tokenizing",
            PipelineStage::Validating => "validating",
            PipelineStage::Aggregating => "aggregating",
            PipelineStage::Done => "done",
        };
        f.write_str(label)
    }
}

/// One CSV data row: column name to trimmed raw value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRecord {
    /// 1-based line number in the source file
    #[serde(skip)]
    pub line: usize,

    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(line: usize, fields: BTreeMap<String, String>) -> Self {
        Self { line, fields }
    }

    /// Raw value of a column, if the column exists
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Raw value of a column when present and non-empty
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|value| !value.is_empty())
    }
}

/// Canonical truncated timestamp identifying one aggregation bucket
///
/// `YYYY-MM-DDTHH` for hourly, `YYYY-MM-DD` for daily and `YYYY-Www` for
/// ISO weeks. Derived only from the row's own timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey {
    key: String,
    granularity: Granularity,
}

impl PeriodKey {
    /// Truncate an instant to the period of `granularity`
    pub fn from_instant(instant: NaiveDateTime, granularity: Granularity) -> Self {
        let key = match granularity {
            Granularity::Hourly => instant.format("%Y-%m-%dT%H").to_string(),
            Granularity::Daily => instant.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => {
                let week = instant.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
        };
        Self { key, granularity }
    }

    /// Derive the period of a `source`-granularity timestamp at `target` granularity
    pub fn derive(value: &str, source: Granularity, target: Granularity) -> Option<Self> {
        source
            .parse_period_start(value)
            .map(|instant| Self::from_instant(instant, target))
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Timestamp rendered in the output's time column
    ///
    /// Hourly keys expand back to `YYYY-MM-DDTHH:00:00`; the others are unchanged.
    pub fn timestamp(&self) -> String {
        match self.granularity {
            Granularity::Hourly => format!("{}:00:00", self.key),
            Granularity::Daily | Granularity::Weekly => self.key.clone(),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Reduced values of one period
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub period_key: PeriodKey,
    pub row_count: usize,
    pub summed_fields: BTreeMap<String, f64>,
    pub averaged_fields: BTreeMap<String, Option<f64>>,
}

/// Numeric access shared by aggregated periods and pass-through rows
pub trait FieldValues {
    /// Value of a summed column; missing or unparseable reads as zero
    fn summed(&self, field: &str) -> f64;

    /// Value of an averaged column; `None` when no sample was usable
    fn averaged(&self, field: &str) -> Option<f64>;
}

impl FieldValues for AggregatedRecord {
    fn summed(&self, field: &str) -> f64 {
        self.summed_fields.get(field).copied().unwrap_or(0.0)
    }

    fn averaged(&self, field: &str) -> Option<f64> {
        self.averaged_fields.get(field).copied().flatten()
    }
}

/// Time column of an output record, serialized under its own column name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timestamp {
    Date(String),
    Time(String),
    Week(String),
}

impl Timestamp {
    pub fn new(field: TimeField, value: impl Into<String>) -> Self {
        let value = value.into();
        match field {
            TimeField::Date => Timestamp::Date(value),
            TimeField::Time => Timestamp::Time(value),
            TimeField::Week => Timestamp::Week(value),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Timestamp::Date(value) | Timestamp::Time(value) | Timestamp::Week(value) => value,
        }
    }
}

/// Solar measurements of one output record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarMeasurements {
    pub solar_power: f64,
    pub dhi: f64,
    pub dni: f64,
    pub ghi: f64,
    pub temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub solar_zenith_angle: Option<f64>,
}

impl SolarMeasurements {
    pub fn from_values(values: &impl FieldValues) -> Self {
        Self {
            solar_power: values.summed(fields::SOLAR_POWER),
            dhi: values.summed(fields::DHI),
            dni: values.summed(fields::DNI),
            ghi: values.summed(fields::GHI),
            temperature: values.averaged(fields::TEMPERATURE),
            relative_humidity: values.averaged(fields::RELATIVE_HUMIDITY),
            solar_zenith_angle: values.averaged(fields::SOLAR_ZENITH_ANGLE),
        }
    }
}

/// Wind measurements of one output record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindMeasurements {
    pub wind_power: f64,
    pub wind_speed: Option<f64>,
    pub dew_point: Option<f64>,
}

impl WindMeasurements {
    pub fn from_values(values: &impl FieldValues) -> Self {
        Self {
            wind_power: values.summed(fields::WIND_POWER),
            wind_speed: values.averaged(fields::WIND_SPEED),
            dew_point: values.averaged(fields::DEW_POINT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarRecord {
    #[serde(flatten)]
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub solar: SolarMeasurements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindRecord {
    #[serde(flatten)]
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub wind: WindMeasurements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecord {
    #[serde(flatten)]
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub solar: SolarMeasurements,
    #[serde(flatten)]
    pub wind: WindMeasurements,
}

/// Normalized output record, serialized as one flat JSON object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainRecord {
    Solar(SolarRecord),
    Wind(WindRecord),
    Combined(CombinedRecord),
}

impl DomainRecord {
    /// Build the typed record of `domain` from reduced values
    pub fn build(domain: Domain, timestamp: Timestamp, values: &impl FieldValues) -> Self {
        match domain {
            Domain::Solar => DomainRecord::Solar(SolarRecord {
                timestamp,
                solar: SolarMeasurements::from_values(values),
            }),
            Domain::Wind => DomainRecord::Wind(WindRecord {
                timestamp,
                wind: WindMeasurements::from_values(values),
            }),
            Domain::Combined => DomainRecord::Combined(CombinedRecord {
                timestamp,
                solar: SolarMeasurements::from_values(values),
                wind: WindMeasurements::from_values(values),
            }),
        }
    }

    pub fn timestamp(&self) -> &Timestamp {
        match self {
            DomainRecord::Solar(record) => &record.timestamp,
            DomainRecord::Wind(record) => &record.timestamp,
            DomainRecord::Combined(record) => &record.timestamp,
        }
    }

    pub fn solar(&self) -> Option<&SolarMeasurements> {
        match self {
            DomainRecord::Solar(record) => Some(&record.solar),
            DomainRecord::Combined(record) => Some(&record.solar),
            DomainRecord::Wind(_) => None,
        }
    }

    pub fn wind(&self) -> Option<&WindMeasurements> {
        match self {
            DomainRecord::Wind(record) => Some(&record.wind),
            DomainRecord::Combined(record) => Some(&record.wind),
            DomainRecord::Solar(_) => None,
        }
    }
}

/// Counters from the validation stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub rows_checked: usize,
    pub rows_without_timestamp: usize,
}

/// Outcome of validating one file; the first invalid row fails the file
#[derive(Debug)]
pub enum ValidationResult {
    Valid(ValidationSummary),
    Invalid(Error),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    /// Row index of the failure, when it is tied to a row
    pub fn row_index(&self) -> Option<usize> {
        match self {
            ValidationResult::Valid(_) => None,
            ValidationResult::Invalid(error) => error.row_index(),
        }
    }

    pub fn into_result(self) -> Result<ValidationSummary> {
        match self {
            ValidationResult::Valid(summary) => Ok(summary),
            ValidationResult::Invalid(error) => Err(error),
        }
    }
}

/// What one successful run saw and produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub domain: Domain,
    pub detected_granularity: Granularity,
    pub output_granularity: Granularity,
    pub mode: PipelineMode,
    pub rows_read: usize,
    pub rows_skipped_shape: usize,
    pub rows_without_timestamp: usize,
    pub records_emitted: usize,
}

/// Terminal value of one pipeline run: data or a reason, never both
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Complete {
        data: Vec<DomainRecord>,
        summary: RunSummary,
    },
    Failed {
        reason: String,
    },
}

impl PipelineOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        PipelineOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, PipelineOutcome::Complete { .. })
    }

    /// Records of a completed run
    pub fn records(&self) -> Option<&[DomainRecord]> {
        match self {
            PipelineOutcome::Complete { data, .. } => Some(data),
            PipelineOutcome::Failed { .. } => None,
        }
    }

    /// Failure reason of a failed run
    pub fn reason(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Complete { .. } => None,
            PipelineOutcome::Failed { reason } => Some(reason),
        }
    }
}
