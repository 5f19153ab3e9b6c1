//! Tokenization statistics and collected results
//!
//! This module provides the counters kept while tokenizing a stream and the
//! structure holding a fully tokenized file.

use crate::app::models::RawRecord;

/// Result of tokenizing a whole stream
#[derive(Debug, Clone)]
pub struct TokenizedFile {
    /// Header fields (first non-empty line), if any line was seen
    pub header: Option<Vec<String>>,

    /// Data rows whose field count matched the header, in file order
    pub rows: Vec<RawRecord>,

    /// Tokenization counters
    pub stats: TokenizerStats,
}

impl TokenizedFile {
    /// True when no data line followed the header
    pub fn is_header_only(&self) -> bool {
        self.header.is_none() || self.stats.data_lines == 0
    }
}

/// Counters kept while tokenizing
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenizerStats {
    /// Physical lines seen, including blank ones and the header
    pub lines_read: usize,

    /// Lines containing only whitespace
    pub blank_lines: usize,

    /// Non-empty lines after the header
    pub data_lines: usize,

    /// Rows handed on as raw records
    pub rows_emitted: usize,

    /// Rows skipped because their field count differed from the header
    pub shape_mismatches: usize,
}

impl TokenizerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of data lines that were emitted, as a percentage
    pub fn acceptance_rate(&self) -> f64 {
        if self.data_lines == 0 {
            0.0
        } else {
            (self.rows_emitted as f64 / self.data_lines as f64) * 100.0
        }
    }
}
