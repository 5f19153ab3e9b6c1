//! Async driver for the CSV tokenizer
//!
//! Pulls fixed-size chunks from an `AsyncRead` and feeds them to a
//! [`CsvTokenizer`]. The next chunk is only requested once the previous one
//! has been consumed into the line buffer.

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::stats::{TokenizedFile, TokenizerStats};
use super::tokenizer::CsvTokenizer;
use crate::app::models::RawRecord;
use crate::{Error, Result};

/// Lazy sequence of row batches read from one stream
///
/// Not seekable: restart by creating a new stream over a fresh reader.
#[derive(Debug)]
pub struct CsvTokenStream<R> {
    reader: R,
    tokenizer: CsvTokenizer,
    buffer: Vec<u8>,
    bytes_read: u64,
    finished: bool,
}

impl<R: AsyncRead + Unpin> CsvTokenStream<R> {
    /// Create a stream with a plain tokenizer
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self::with_tokenizer(reader, CsvTokenizer::new(), chunk_size)
    }

    /// Create a stream around a configured tokenizer
    pub fn with_tokenizer(reader: R, tokenizer: CsvTokenizer, chunk_size: usize) -> Self {
        Self {
            reader,
            tokenizer,
            buffer: vec![0; chunk_size.max(1)],
            bytes_read: 0,
            finished: false,
        }
    }

    /// Read the next chunk and return the rows it completed
    ///
    /// Batches may be empty (a chunk holding only a partial line). Returns
    /// `Ok(None)` once the stream is exhausted and the last line flushed.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.finished {
            return Ok(None);
        }

        let read = self
            .reader
            .read(&mut self.buffer)
            .await
            .map_err(|e| Error::io("Failed to read CSV stream", e))?;

        if read == 0 {
            self.finished = true;
            debug!(
                "Reached end of stream after {} bytes, {} lines",
                self.bytes_read,
                self.tokenizer.stats().lines_read
            );
            return Ok(Some(self.tokenizer.finish()));
        }

        self.bytes_read += read as u64;
        Ok(Some(self.tokenizer.push(&self.buffer[..read])))
    }

    pub fn header(&self) -> Option<&[String]> {
        self.tokenizer.header()
    }

    pub fn stats(&self) -> &TokenizerStats {
        self.tokenizer.stats()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Tokenize the remaining stream into memory
    pub async fn collect_all(mut self) -> Result<TokenizedFile> {
        let mut rows = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            rows.extend(batch);
        }
        Ok(self.into_file(rows))
    }

    /// Consume the stream, pairing its header and stats with `rows`
    pub fn into_file(self, rows: Vec<RawRecord>) -> TokenizedFile {
        self.tokenizer.into_file(rows)
    }
}
