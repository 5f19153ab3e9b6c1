//! Push-based CSV line tokenizer
//!
//! Bytes are appended to a line buffer; only complete lines (terminated by
//! `\n`) are parsed. The trailing partial line stays buffered until the next
//! chunk or [`CsvTokenizer::finish`]. Because the buffer holds raw bytes and
//! `\n` never occurs inside a multi-byte UTF-8 sequence, code points split
//! across chunks are reassembled before decoding.

use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::stats::{TokenizedFile, TokenizerStats};
use crate::app::models::RawRecord;

/// Initial parser buffer for quoted lines; it grows for longer lines
const QUOTED_LINE_BUFFER: usize = 1024;

/// Maps each header title to the column name used in raw records
pub type HeaderNormalizer = fn(&str) -> String;

/// Incremental tokenizer for one CSV stream
#[derive(Debug)]
pub struct CsvTokenizer {
    pending: Vec<u8>,
    scanned: usize,
    header: Option<Vec<String>>,
    line_number: usize,
    normalizer: Option<HeaderNormalizer>,
    reader_builder: csv::ReaderBuilder,
    stats: TokenizerStats,
}

impl CsvTokenizer {
    /// Create a tokenizer that keeps header titles as written (trimmed)
    pub fn new() -> Self {
        let mut reader_builder = csv::ReaderBuilder::new();
        reader_builder
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .buffer_capacity(QUOTED_LINE_BUFFER);

        Self {
            pending: Vec::new(),
            scanned: 0,
            header: None,
            line_number: 0,
            normalizer: None,
            reader_builder,
            stats: TokenizerStats::new(),
        }
    }

    /// Rename header titles through `normalizer` before rows are built
    pub fn with_header_normalizer(mut self, normalizer: HeaderNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Header fields, once the first non-empty line has been seen
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn stats(&self) -> &TokenizerStats {
        &self.stats
    }

    /// Number of bytes held back waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one chunk and return the rows completed by it
    ///
    /// Only the bytes added since the last call are searched for a line
    /// terminator, so a long line arriving in many small chunks is scanned once.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawRecord> {
        self.pending.extend_from_slice(chunk);

        let last_newline = self.pending[self.scanned..]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|offset| self.scanned + offset);

        let Some(last_newline) = last_newline else {
            self.scanned = self.pending.len();
            trace!("Holding {} bytes of partial line", self.pending.len());
            return Vec::new();
        };

        let mut complete = std::mem::take(&mut self.pending);
        self.pending = complete.split_off(last_newline + 1);
        self.scanned = 0;

        complete[..last_newline]
            .split(|&b| b == b'\n')
            .filter_map(|line| self.process_line(line))
            .collect()
    }

    /// Flush the final unterminated line, if any
    pub fn finish(&mut self) -> Vec<RawRecord> {
        let buffer = std::mem::take(&mut self.pending);
        self.scanned = 0;
        if buffer.is_empty() {
            return Vec::new();
        }
        self.process_line(&buffer).into_iter().collect()
    }

    /// Tokenize a complete in-memory input
    pub fn tokenize_all(mut self, input: &[u8]) -> TokenizedFile {
        let mut rows = self.push(input);
        rows.extend(self.finish());
        self.into_file(rows)
    }

    /// Consume the tokenizer, pairing its header and stats with `rows`
    pub fn into_file(self, rows: Vec<RawRecord>) -> TokenizedFile {
        TokenizedFile {
            header: self.header,
            rows,
            stats: self.stats,
        }
    }

    fn process_line(&mut self, bytes: &[u8]) -> Option<RawRecord> {
        self.line_number += 1;
        self.stats.lines_read += 1;

        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            self.stats.blank_lines += 1;
            return None;
        }

        if self.header.is_none() {
            let titles = self.split_fields(text.trim_start_matches('\u{feff}'));
            let header: Vec<String> = match self.normalizer {
                Some(normalize) => titles.iter().map(|title| normalize(title)).collect(),
                None => titles,
            };
            debug!("Parsed header on line {}: {:?}", self.line_number, header);
            self.header = Some(header);
            return None;
        }

        self.stats.data_lines += 1;
        let values = self.split_fields(&text);
        let header = self.header.as_ref()?;
        if values.len() != header.len() {
            self.stats.shape_mismatches += 1;
            debug!(
                "Skipping line {}: {} fields, header has {}",
                self.line_number,
                values.len(),
                header.len()
            );
            return None;
        }

        let fields: BTreeMap<String, String> = header.iter().cloned().zip(values).collect();
        self.stats.rows_emitted += 1;
        Some(RawRecord::new(self.line_number, fields))
    }

    /// Split one line into trimmed fields
    ///
    /// Lines without a quote character are split on commas directly; quoted
    /// lines go through the `csv` parser so embedded commas survive.
    fn split_fields(&self, line: &str) -> Vec<String> {
        if !line.contains('"') {
            return line.split(',').map(|field| field.trim().to_string()).collect();
        }

        let mut reader = self.reader_builder.from_reader(line.as_bytes());
        let mut record = csv::StringRecord::new();

        match reader.read_record(&mut record) {
            Ok(true) => record.iter().map(str::to_string).collect(),
            Ok(false) => Vec::new(),
            Err(e) => {
                debug!("Falling back to plain split on line {}: {}", self.line_number, e);
                line.split(',').map(|field| field.trim().to_string()).collect()
            }
        }
    }
}

impl Default for CsvTokenizer {
    fn default() -> Self {
        Self::new()
    }
}
