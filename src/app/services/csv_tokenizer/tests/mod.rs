//! Test utilities for CSV tokenizer testing
//!
//! Shared sample inputs and helpers used by the tokenizer and stream tests.

use crate::app::models::RawRecord;


/// Small hourly solar file with a blank line and a malformed row
pub fn sample_solar_csv() -> &'static str {
    "time, solar_power ,dhi,dni,ghi,temperature,relative_humidity,solar_zenith_angle\n\
     2024-02-05T14:00:00,1.0,10,20,30,5.5,80,60.1\n\
     \n\
     2024-02-05T14:00:00,2.0,11,21,31,6.5,82,60.3\n\
     2024-02-05T15:00:00,1.5,12\n\
     2024-02-05T15:00:00 , 0.5 ,13,23,33,7.0,85,61.0\n"
}

/// Values of one column across rows
pub fn column(rows: &[RawRecord], name: &str) -> Vec<String> {
    rows.iter()
        .map(|row| row.get(name).unwrap_or_default().to_string())
        .collect()
}
