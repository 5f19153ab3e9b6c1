//! Background ingestion pipeline
//!
//! One [`PipelineCoordinator`] processes one uploaded file on a tokio task and
//! reports to the caller through a [`PipelineHandle`]:
//!
//! 1. **Tokenizing**: the upload is read chunk by chunk; preview chunks are
//!    emitted as rows accumulate
//! 2. **Validating**: the time column is classified, the schema looked up,
//!    and columns and timestamps checked
//! 3. **Aggregating**: rows are grouped into periods (or passed through) and
//!    converted to typed records
//!
//! # Examples
//!
//! ```rust,no_run
//! use energy_ingest::app::services::pipeline::UploadFile;
//! use energy_ingest::{Domain, PipelineConfig, PipelineCoordinator};
//!
//! # async fn example() -> energy_ingest::Result<()> {
//! let file = UploadFile::open("wind_weekly.csv").await?;
//! let coordinator = PipelineCoordinator::new(PipelineConfig::new(Domain::Wind));
//!
//! let outcome = coordinator.spawn(Some(file)).outcome().await;
//! match outcome.reason() {
//!     Some(reason) => eprintln!("Upload rejected: {}", reason),
//!     None => println!("{} records", outcome.records().unwrap_or_default().len()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod messages;

#[cfg(test)]
pub mod tests;

pub use coordinator::PipelineCoordinator;
pub use messages::{PipelineHandle, PipelineMessage, TERMINATED_REASON, UploadFile};
