//! Time column classification
//!
//! A file must carry exactly one of the `date`, `time` or `week` columns. That
//! column becomes the time field for every row and fixes the file's
//! granularity; anything else is reported rather than guessed.

use tracing::debug;

use crate::app::models::{Granularity, TimeField};
use crate::{Error, Result};

/// The time field chosen for a whole file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub time_field: TimeField,
    pub granularity: Granularity,
}

/// Determine the unique time column of a header
pub fn classify(header: &[String]) -> Result<Classification> {
    let time_fields: Vec<TimeField> = header
        .iter()
        .filter_map(|column| TimeField::from_column(column.as_str()))
        .collect();

    // A repeated time column is as ambiguous as two different ones
    let [time_field] = time_fields.as_slice() else {
        debug!("Ambiguous time columns {:?} in header {:?}", time_fields, header);
        return Err(Error::ambiguous_time_column(header));
    };

    Ok(Classification {
        time_field: *time_field,
        granularity: time_field.granularity(),
    })
}
