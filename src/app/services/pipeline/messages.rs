//! Pipeline input, messages and the caller's handle
//!
//! A run receives one [`UploadFile`] and answers over a bounded channel: zero
//! or more progress messages followed by exactly one terminal message
//! (`complete` or `error`). The wire form mirrors the messages a browser
//! worker would post:
//!
//! ```text
//! {"type":"stage","stage":"validating"}
//! {"type":"chunk","data":[{"time":"2024-02-05T14:00:00","solar_power":"1.0",...}]}
//! {"type":"complete","data":[...]}
//! {"type":"error","error":"Missing required columns: dhi"}
//! ```

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::models::{DomainRecord, PipelineOutcome, PipelineStage, RawRecord, RunSummary};
use crate::{Error, Result};

/// The file handed to a pipeline run
pub struct UploadFile {
    name: String,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl UploadFile {
    /// Open a file on disk
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io(format!("Failed to open {}", path.display()), e))?;
        Ok(Self::from_reader(path.display().to_string(), file))
    }

    /// Wrap an in-memory upload
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(name, std::io::Cursor::new(bytes.into()))
    }

    /// Wrap any async byte source
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_reader(self) -> Box<dyn AsyncRead + Send + Unpin> {
        self.reader
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Message sent from a running pipeline to its caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PipelineMessage {
    /// The run entered a new stage
    Stage { stage: PipelineStage },

    /// Preview of the most recently tokenized rows
    Chunk { data: Vec<RawRecord> },

    /// Terminal: the normalized records
    Complete {
        data: Vec<DomainRecord>,
        #[serde(skip)]
        summary: RunSummary,
    },

    /// Terminal: human-readable failure reason
    Error { error: String },
}

impl PipelineMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineMessage::Complete { .. } | PipelineMessage::Error { .. }
        )
    }

    /// Outcome carried by a terminal message
    pub fn into_outcome(self) -> Option<PipelineOutcome> {
        match self {
            PipelineMessage::Complete { data, summary } => {
                Some(PipelineOutcome::Complete { data, summary })
            }
            PipelineMessage::Error { error } => Some(PipelineOutcome::failed(error)),
            PipelineMessage::Stage { .. } | PipelineMessage::Chunk { .. } => None,
        }
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::serialization("Failed to serialize pipeline message", e))
    }
}

/// Reason reported when a run ends without a terminal message
pub const TERMINATED_REASON: &str = "Pipeline terminated before completion";

/// Caller side of one pipeline run
///
/// Dropping the handle aborts the run.
#[derive(Debug)]
pub struct PipelineHandle {
    receiver: mpsc::Receiver<PipelineMessage>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    pub(crate) fn new(receiver: mpsc::Receiver<PipelineMessage>, task: JoinHandle<()>) -> Self {
        Self { receiver, task }
    }

    /// Next message, or `None` once the run has ended
    pub async fn recv(&mut self) -> Option<PipelineMessage> {
        self.receiver.recv().await
    }

    /// Abort the run; no terminal message will follow
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal message, discarding progress
    pub async fn outcome(self) -> PipelineOutcome {
        self.outcome_with(|_| {}).await
    }

    /// Wait for the terminal message, passing every progress message to `on_progress`
    pub async fn outcome_with<F>(mut self, mut on_progress: F) -> PipelineOutcome
    where
        F: FnMut(&PipelineMessage),
    {
        while let Some(message) = self.receiver.recv().await {
            if !message.is_terminal() {
                on_progress(&message);
                continue;
            }
            if let Some(outcome) = message.into_outcome() {
                return outcome;
            }
        }
        PipelineOutcome::failed(TERMINATED_REASON)
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
