//! Incremental CSV tokenizer for telemetry uploads
//!
//! This module turns a byte stream into a header and a sequence of raw rows
//! without ever parsing a line before it is complete. It knows nothing about
//! schemas; column checks happen in the row validator.
//!
//! ## Architecture
//!
//! - [`tokenizer`] - Push-based line buffer and field splitting
//! - [`stream`] - Async driver pulling chunks from an `AsyncRead`
//! - [`stats`] - Tokenization counters and collected results
//!
//! ## Usage
//!
//! ```rust
//! use energy_ingest::app::services::csv_tokenizer::CsvTokenStream;
//!
//! # async fn example() -> energy_ingest::Result<()> {
//! let input: &[u8] = b"time,wind_power\n2024-02-05T14:00:00,1.5\n";
//! let tokenized = CsvTokenStream::new(input, 4096).collect_all().await?;
//!
//! assert_eq!(tokenized.rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod stats;
pub mod stream;
pub mod tokenizer;

#[cfg(test)]
pub mod tests;

// Re-export main types for easy access
pub use stats::{TokenizedFile, TokenizerStats};
pub use stream::CsvTokenStream;
pub use tokenizer::{CsvTokenizer, HeaderNormalizer};
