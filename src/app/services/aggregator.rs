//! Period aggregation
//!
//! Groups validated rows by period key and reduces each numeric column
//! according to its schema reduction:
//!
//! - **Sum**: cumulative quantities (power, irradiance). Empty or unparseable
//!   cells contribute `0`.
//! - **Mean**: sampled quantities (temperature, wind speed). Empty or
//!   unparseable cells are left out of both numerator and denominator; a
//!   period with no usable sample yields `null`.
//!
//! Periods are emitted in the order their key is first seen. The same
//! reductions also back pass-through mode, where each row becomes one record.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::app::models::{
    AggregatedRecord, Domain, DomainRecord, FieldValues, Granularity, PeriodKey, RawRecord,
    Reduction, Schema, Timestamp,
};
use crate::{Error, Result};

/// Parse a numeric cell; empty, malformed and non-finite values give `None`
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|number| number.is_finite())
}

impl FieldValues for RawRecord {
    fn summed(&self, field: &str) -> f64 {
        self.get(field).and_then(parse_numeric).unwrap_or(0.0)
    }

    fn averaged(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(parse_numeric)
    }
}

/// Running reduction of one period
#[derive(Debug)]
struct PeriodAccumulator {
    period_key: PeriodKey,
    row_count: usize,
    sums: Vec<f64>,
    means: Vec<(f64, usize)>,
}

impl PeriodAccumulator {
    fn new(period_key: PeriodKey, field_count: usize) -> Self {
        Self {
            period_key,
            row_count: 0,
            sums: vec![0.0; field_count],
            means: vec![(0.0, 0); field_count],
        }
    }

    fn add(&mut self, row: &RawRecord, schema: &Schema) {
        self.row_count += 1;
        for (index, field) in schema.fields.iter().enumerate() {
            let value = row.get(field.name).and_then(parse_numeric);
            match field.reduction {
                Reduction::Sum => self.sums[index] += value.unwrap_or(0.0),
                Reduction::Mean => {
                    if let Some(value) = value {
                        let (total, count) = &mut self.means[index];
                        *total += value;
                        *count += 1;
                    }
                }
            }
        }
    }

    fn finish(self, schema: &Schema) -> AggregatedRecord {
        let mut summed_fields = BTreeMap::new();
        let mut averaged_fields = BTreeMap::new();

        for (index, field) in schema.fields.iter().enumerate() {
            match field.reduction {
                Reduction::Sum => {
                    summed_fields.insert(field.name.to_string(), self.sums[index]);
                }
                Reduction::Mean => {
                    let (total, count) = self.means[index];
                    let mean = (count > 0).then(|| total / count as f64);
                    averaged_fields.insert(field.name.to_string(), mean);
                }
            }
        }

        AggregatedRecord {
            period_key: self.period_key,
            row_count: self.row_count,
            summed_fields,
            averaged_fields,
        }
    }
}

/// Check that `target` is the file's granularity or a coarser one
pub fn check_target(detected: Granularity, target: Granularity) -> Result<()> {
    if target < detected {
        return Err(Error::InvalidGranularityTarget { detected, target });
    }
    Ok(())
}

/// Running aggregation of one file, fed batch by batch
///
/// Periods keep the order their key was first seen across all batches.
#[derive(Debug)]
pub struct Aggregation {
    target: Granularity,
    index: HashMap<PeriodKey, usize>,
    periods: Vec<PeriodAccumulator>,
    rows_seen: usize,
}

impl Aggregation {
    /// Start aggregating rows of `schema` into `target` periods
    pub fn new(schema: &Schema, target: Granularity) -> Result<Self> {
        check_target(schema.granularity, target)?;
        Ok(Self {
            target,
            index: HashMap::new(),
            periods: Vec::new(),
            rows_seen: 0,
        })
    }

    pub fn add_rows(&mut self, rows: &[RawRecord], schema: &Schema) {
        let time_column = schema.time_field.column_name();
        self.rows_seen += rows.len();

        for row in rows {
            let Some(value) = row.non_empty(time_column) else {
                continue;
            };

            let Some(period_key) = PeriodKey::derive(value, schema.granularity, self.target)
            else {
                warn!(
                    "Line {}: cannot derive {} period from '{}', row ignored",
                    row.line, self.target, value
                );
                continue;
            };

            let periods = &mut self.periods;
            let slot = *self.index.entry(period_key.clone()).or_insert_with(|| {
                periods.push(PeriodAccumulator::new(period_key, schema.fields.len()));
                periods.len() - 1
            });
            periods[slot].add(row, schema);
        }
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    pub fn finish(self, schema: &Schema) -> Vec<AggregatedRecord> {
        debug!(
            "Aggregated {} rows into {} {} periods",
            self.rows_seen,
            self.periods.len(),
            self.target
        );
        self.periods
            .into_iter()
            .map(|period| period.finish(schema))
            .collect()
    }
}

/// Group rows into `target` periods and reduce each one
///
/// `target` may equal the schema's granularity or be coarser (roll-up);
/// a finer target is rejected. Rows without a time value are ignored.
pub fn aggregate(
    rows: &[RawRecord],
    schema: &Schema,
    target: Granularity,
) -> Result<Vec<AggregatedRecord>> {
    let mut aggregation = Aggregation::new(schema, target)?;
    aggregation.add_rows(rows, schema);
    Ok(aggregation.finish(schema))
}

/// Convert aggregated periods into typed records of `domain`
pub fn to_domain_records(periods: &[AggregatedRecord], domain: Domain) -> Vec<DomainRecord> {
    periods
        .iter()
        .map(|period| {
            let granularity = period.period_key.granularity();
            let timestamp = Timestamp::new(granularity.time_field(), period.period_key.timestamp());
            DomainRecord::build(domain, timestamp, period)
        })
        .collect()
}

/// Convert each timestamped row into one typed record, keeping its raw time value
pub fn pass_through(rows: &[RawRecord], schema: &Schema) -> Vec<DomainRecord> {
    let time_column = schema.time_field.column_name();
    rows.iter()
        .filter_map(|row| {
            let value = row.non_empty(time_column)?;
            let timestamp = Timestamp::new(schema.time_field, value);
            Some(DomainRecord::build(schema.domain, timestamp, row))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::schema_registry::SchemaRegistry;

    fn row(line: usize, pairs: &[(&str, &str)]) -> RawRecord {
        let fields: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RawRecord::new(line, fields)
    }

    fn solar_row(line: usize, time: &str, power: &str, temperature: &str) -> RawRecord {
        row(
            line,
            &[
                ("time", time),
                ("solar_power", power),
                ("dhi", "1"),
                ("dni", "2"),
                ("ghi", "3"),
                ("temperature", temperature),
                ("relative_humidity", "50"),
                ("solar_zenith_angle", "45"),
            ],
        )
    }

    fn wind_row(line: usize, week: &str, power: &str, dew_point: &str) -> RawRecord {
        row(
            line,
            &[
                ("week", week),
                ("wind_power", power),
                ("wind_speed", "4"),
                ("dew_point", dew_point),
            ],
        )
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric(" 1.5 "), Some(1.5));
        assert_eq!(parse_numeric("-3"), Some(-3.0));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("n/a"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("inf"), None);
    }

    #[test]
    fn test_two_rows_in_one_hour_are_summed() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Solar, Granularity::Hourly).unwrap();
        let rows = vec![
            solar_row(2, "2024-02-05T14:00:00", "1.0", "10"),
            solar_row(3, "2024-02-05T14:00:00", "2.0", "20"),
        ];

        let periods = aggregate(&rows, schema, Granularity::Hourly).unwrap();
        assert_eq!(periods.len(), 1);

        let period = &periods[0];
        assert_eq!(period.period_key.as_str(), "2024-02-05T14");
        assert_eq!(period.row_count, 2);
        assert_eq!(period.summed("solar_power"), 3.0);
        assert_eq!(period.summed("dhi"), 2.0);
        assert_eq!(period.averaged("temperature"), Some(15.0));
        assert_eq!(period.averaged("relative_humidity"), Some(50.0));
    }

    #[test]
    fn test_mean_excludes_missing_samples() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let rows = vec![
            wind_row(2, "2024-W06", "1", "2.0"),
            wind_row(3, "2024-W06", "2", ""),
            wind_row(4, "2024-W06", "3", "4.0"),
        ];

        let periods = aggregate(&rows, schema, Granularity::Weekly).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].averaged("dew_point"), Some(3.0));
        assert_eq!(periods[0].averaged("wind_speed"), Some(4.0));
        assert_eq!(periods[0].summed("wind_power"), 6.0);
    }

    #[test]
    fn test_zero_contributors_yield_null_and_sums_zero_fill() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let rows = vec![
            wind_row(2, "2024-W06", "abc", ""),
            wind_row(3, "2024-W06", "2.5", "n/a"),
        ];

        let periods = aggregate(&rows, schema, Granularity::Weekly).unwrap();
        assert_eq!(periods[0].averaged("dew_point"), None);
        assert_eq!(periods[0].summed("wind_power"), 2.5);
    }

    #[test]
    fn test_periods_keep_first_seen_order() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let rows = vec![
            wind_row(2, "2024-W07", "1", "1"),
            wind_row(3, "2024-W05", "1", "1"),
            wind_row(4, "2024-W07", "1", "1"),
            wind_row(5, "2024-W06", "1", "1"),
        ];

        let periods = aggregate(&rows, schema, Granularity::Weekly).unwrap();
        let keys: Vec<&str> = periods.iter().map(|p| p.period_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-W07", "2024-W05", "2024-W06"]);
        assert_eq!(periods[0].row_count, 2);
    }

    #[test]
    fn test_single_row_period_is_unchanged() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let rows = vec![wind_row(2, "2024-W06", "7.5", "-1.25")];

        let periods = aggregate(&rows, schema, Granularity::Weekly).unwrap();
        assert_eq!(periods[0].summed("wind_power"), 7.5);
        assert_eq!(periods[0].averaged("dew_point"), Some(-1.25));
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Solar, Granularity::Daily).unwrap();
        assert!(aggregate(&[], schema, Granularity::Daily).unwrap().is_empty());
    }

    #[test]
    fn test_rows_without_timestamp_are_ignored() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let rows = vec![
            wind_row(2, "", "100", "1"),
            wind_row(3, "2024-W06", "1", "1"),
        ];

        let periods = aggregate(&rows, schema, Granularity::Weekly).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].summed("wind_power"), 1.0);
    }

    #[test]
    fn test_roll_up_hourly_to_daily_and_weekly() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Solar, Granularity::Hourly).unwrap();
        let rows = vec![
            solar_row(2, "2024-02-05T23:00:00", "1", "10"),
            solar_row(3, "2024-02-06T00:00:00", "2", "20"),
            solar_row(4, "2024-02-06T01:00:00", "3", "30"),
        ];

        let daily = aggregate(&rows, schema, Granularity::Daily).unwrap();
        let keys: Vec<&str> = daily.iter().map(|p| p.period_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-02-05", "2024-02-06"]);
        assert_eq!(daily[1].summed("solar_power"), 5.0);
        assert_eq!(daily[1].averaged("temperature"), Some(25.0));

        let weekly = aggregate(&rows, schema, Granularity::Weekly).unwrap();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].period_key.as_str(), "2024-W06");
        assert_eq!(weekly[0].summed("solar_power"), 6.0);
    }

    #[test]
    fn test_batches_aggregate_like_one_pass() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let rows = vec![
            wind_row(2, "2024-W06", "1", "2.0"),
            wind_row(3, "2024-W05", "5", "1.0"),
            wind_row(4, "2024-W06", "2", ""),
            wind_row(5, "2024-W06", "3", "4.0"),
            wind_row(6, "2024-W05", "1", "3.0"),
        ];

        let mut aggregation = Aggregation::new(schema, Granularity::Weekly).unwrap();
        for batch in rows.chunks(2) {
            aggregation.add_rows(batch, schema);
        }
        assert_eq!(aggregation.period_count(), 2);

        let batched = aggregation.finish(schema);
        let whole = aggregate(&rows, schema, Granularity::Weekly).unwrap();
        assert_eq!(batched, whole);
        assert_eq!(batched[0].period_key.as_str(), "2024-W06");
        assert_eq!(batched[0].row_count, 3);
        assert_eq!(batched[0].averaged("dew_point"), Some(3.0));
    }

    #[test]
    fn test_finer_target_is_rejected() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();

        let err = aggregate(&[], schema, Granularity::Daily).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidGranularityTarget {
                detected: Granularity::Weekly,
                target: Granularity::Daily
            }
        ));
    }

    #[test]
    fn test_hourly_records_render_full_timestamp() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Solar, Granularity::Hourly).unwrap();
        let rows = vec![solar_row(2, "2024-02-05T14:00:00", "1", "10")];

        let periods = aggregate(&rows, schema, Granularity::Hourly).unwrap();
        let records = to_domain_records(&periods, Domain::Solar);

        assert_eq!(
            records[0].timestamp(),
            &Timestamp::Time("2024-02-05T14:00:00".to_string())
        );
        assert_eq!(records[0].solar().unwrap().solar_power, 1.0);
        assert!(records[0].wind().is_none());
    }

    #[test]
    fn test_rolled_up_records_use_target_time_field() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Solar, Granularity::Hourly).unwrap();
        let rows = vec![solar_row(2, "2024-02-05T14:00:00", "1", "10")];

        let periods = aggregate(&rows, schema, Granularity::Daily).unwrap();
        let records = to_domain_records(&periods, Domain::Solar);
        assert_eq!(
            records[0].timestamp(),
            &Timestamp::Date("2024-02-05".to_string())
        );
    }

    #[test]
    fn test_pass_through_keeps_rows_and_numeric_policy() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.lookup(Domain::Wind, Granularity::Weekly).unwrap();
        let rows = vec![
            wind_row(2, "2024-W06", "x", ""),
            wind_row(3, "", "1", "1"),
            wind_row(4, "2024-W06", "2", "3"),
        ];

        let records = pass_through(&rows, schema);
        assert_eq!(records.len(), 2);

        let first = records[0].wind().unwrap();
        assert_eq!(first.wind_power, 0.0);
        assert_eq!(first.dew_point, None);
        assert_eq!(records[1].wind().unwrap().dew_point, Some(3.0));
        assert_eq!(records[1].timestamp().value(), "2024-W06");
    }
}
