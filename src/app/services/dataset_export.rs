//! Dataset hand-off
//!
//! A completed run is handed downstream as a pretty-printed JSON array plus a
//! suggested filename of the form
//! `{granularity}_{domain}_data_{stamp}.json`. The stamp comes from the
//! generation time and never appears inside the payload, so identical input
//! always gives an identical payload.
//!
//! Where the dataset goes is up to a [`DatasetSink`]; [`DirectorySink`] writes
//! it to a local directory.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::models::{Domain, DomainRecord, Granularity};
use crate::constants::{DATASET_EXTENSION, FILENAME_STAMP_FORMAT};
use crate::{Error, Result};

/// Serialized dataset ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetUpload {
    pub filename: String,
    pub payload: String,
}

impl DatasetUpload {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Suggested filename for a dataset generated at `generated_at`
pub fn suggested_filename(
    granularity: Granularity,
    domain: Domain,
    generated_at: DateTime<Utc>,
) -> String {
    format!(
        "{}{}_data_{}.{}",
        granularity.filename_prefix(),
        domain,
        generated_at.format(FILENAME_STAMP_FORMAT),
        DATASET_EXTENSION
    )
}

/// Serialize records as a JSON array with two-space indentation
pub fn to_json(records: &[DomainRecord]) -> Result<String> {
    serde_json::to_string_pretty(records)
        .map_err(|e| Error::serialization("Failed to serialize dataset", e))
}

/// Serialize records and pair them with their suggested filename
pub fn prepare_upload(
    records: &[DomainRecord],
    granularity: Granularity,
    domain: Domain,
    generated_at: DateTime<Utc>,
) -> Result<DatasetUpload> {
    let payload = to_json(records)?;
    let filename = suggested_filename(granularity, domain, generated_at);
    debug!(
        "Prepared {} ({} records, {} bytes)",
        filename,
        records.len(),
        payload.len()
    );
    Ok(DatasetUpload { filename, payload })
}

/// Destination for finished datasets
pub trait DatasetSink {
    /// Store the dataset and return where it ended up
    fn store(&self, upload: &DatasetUpload) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Writes datasets as files under one directory, creating it on first use
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl DatasetSink for DirectorySink {
    async fn store(&self, upload: &DatasetUpload) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| {
                Error::io(
                    format!(
                        "Failed to create output directory {}",
                        self.directory.display()
                    ),
                    e,
                )
            })?;

        let path = self.directory.join(&upload.filename);
        tokio::fs::write(&path, upload.payload.as_bytes())
            .await
            .map_err(|e| Error::io(format!("Failed to write {}", path.display()), e))?;

        info!("Wrote {} bytes to {}", upload.len(), path.display());
        Ok(path)
    }
}
