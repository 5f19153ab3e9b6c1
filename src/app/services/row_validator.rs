//! Row validation against a schema
//!
//! Two checks run before any aggregation: the header must carry every column
//! the schema requires (each exactly once), and every row that has a
//! timestamp must match the granularity's anchored pattern and name a real
//! calendar instant. The first bad row fails the whole file.
//!
//! Rows may be checked in consecutive batches with [`RowValidator`];
//! [`validate`] checks a whole file in one call.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::app::models::{RawRecord, Schema, ValidationResult, ValidationSummary};
use crate::{Error, Result};

/// Check that no two header columns share a name
///
/// Each duplicated name is reported once, in header order.
pub fn check_unique_columns(header: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();

    for title in header {
        if !seen.insert(title.as_str()) && !duplicates.contains(&title.as_str()) {
            duplicates.push(title);
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        debug!("Header {:?} repeats columns {:?}", header, duplicates);
        Err(Error::duplicate_columns(duplicates))
    }
}

/// Check that the header carries the time column and all required fields
///
/// Duplicate names are rejected first, since rows keep only one value per
/// column. Missing columns are reported in schema order, the time column last.
pub fn check_columns(header: &[String], schema: &Schema) -> Result<()> {
    check_unique_columns(header)?;

    let time_column = schema.time_field.column_name();
    let missing: Vec<&str> = schema
        .required_fields()
        .chain(std::iter::once(time_column))
        .filter(|column| !header.iter().any(|title| title == column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        debug!("Header {:?} lacks columns {:?}", header, missing);
        Err(Error::missing_columns(missing))
    }
}

/// Timestamp checks over the rows of one file, fed batch by batch
///
/// Row indices keep counting across batches, so a failure reports the same
/// `row_index` whether the file arrived in one batch or many.
#[derive(Debug, Clone, Default)]
pub struct RowValidator {
    summary: ValidationSummary,
    next_row_index: usize,
}

impl RowValidator {
    /// Check the header and start validating rows
    pub fn new(header: &[String], schema: &Schema) -> Result<Self> {
        check_columns(header, schema)?;
        Ok(Self::default())
    }

    /// Check the next batch of rows
    ///
    /// Rows whose time value is empty or absent are skipped and counted.
    pub fn check_batch(&mut self, rows: &[RawRecord], schema: &Schema) -> Result<()> {
        let time_column = schema.time_field.column_name();

        for row in rows {
            let row_index = self.next_row_index;
            self.next_row_index += 1;

            let Some(value) = row.non_empty(time_column) else {
                self.summary.rows_without_timestamp += 1;
                continue;
            };

            if !is_valid_timestamp(value, schema) {
                warn!(
                    "Rejecting line {} (row {}): '{}' is not a {} timestamp",
                    row.line, row_index, value, schema.granularity
                );
                return Err(Error::invalid_timestamp(
                    row_index,
                    row.line,
                    value,
                    schema.expected_example(),
                ));
            }

            self.summary.rows_checked += 1;
        }

        Ok(())
    }

    pub fn summary(&self) -> &ValidationSummary {
        &self.summary
    }

    pub fn finish(self) -> ValidationSummary {
        self.summary
    }
}

/// Validate a whole file: column completeness, then per-row timestamps
///
/// `row_index` in the failure is the 0-based position in `rows`.
pub fn validate(header: &[String], rows: &[RawRecord], schema: &Schema) -> ValidationResult {
    let mut validator = match RowValidator::new(header, schema) {
        Ok(validator) => validator,
        Err(error) => return ValidationResult::Invalid(error),
    };

    if let Err(error) = validator.check_batch(rows, schema) {
        return ValidationResult::Invalid(error);
    }

    let summary = validator.finish();
    debug!(
        "Validated {} rows ({} without timestamp) against {} {} schema",
        summary.rows_checked, summary.rows_without_timestamp, schema.domain, schema.granularity
    );
    ValidationResult::Valid(summary)
}

fn is_valid_timestamp(value: &str, schema: &Schema) -> bool {
    schema.matches_timestamp(value) && schema.granularity.parse_period_start(value).is_some()
}
