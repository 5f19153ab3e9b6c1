//! Command implementations for the energy-ingest CLI
//!
//! Each command is implemented in its own module:
//! - `process`: run the ingestion pipeline over CSV files and export datasets
//! - `schema`: list the registered domain schemas

pub mod process;
pub mod schema;
pub mod shared;

pub use shared::ProcessingStats;

use crate::cli::args::{Args, Commands};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Main command runner
///
/// Dispatches to the subcommand handler. Long-running commands stop early
/// once `cancellation_token` is cancelled.
pub async fn run(args: Args, cancellation_token: CancellationToken) -> Result<ProcessingStats> {
    match args.command {
        Some(Commands::Process(process_args)) => {
            process::run_process(process_args, cancellation_token).await
        }
        Some(Commands::Schema(schema_args)) => schema::run_schema(schema_args),
        None => Err(Error::configuration("No command given")),
    }
}
