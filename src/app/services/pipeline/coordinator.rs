//! Pipeline coordinator
//!
//! Runs one file through `Tokenizing → Validating → Aggregating` on a
//! background task. Tokenizing awaits the input chunk by chunk. Every
//! `batch_rows` tokenized rows are validated and folded into the running
//! aggregation on the blocking pool, so only that batch and the reduced
//! periods stay in memory. `Validating` is announced with the first data row
//! and `Aggregating` once the input is exhausted. Any failure (or a panic
//! inside a stage) short-circuits to a single `error` message.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::messages::{PipelineHandle, PipelineMessage, UploadFile};
use crate::app::models::{
    DomainRecord, Granularity, PipelineMode, PipelineOutcome, PipelineStage, RawRecord,
    RunSummary, Schema, ValidationSummary,
};
use crate::app::services::aggregator::{self, Aggregation};
use crate::app::services::csv_tokenizer::{CsvTokenStream, CsvTokenizer};
use crate::app::services::row_validator::RowValidator;
use crate::app::services::schema_registry::{self, SchemaRegistry, canonical_column};
use crate::app::services::timestamp_classifier::classify;
use crate::config::PipelineConfig;
use crate::{Error, Result};

/// Generic reason reported when a stage panics
const PANIC_REASON: &str = "a processing stage stopped unexpectedly";

/// Orchestrates a single pipeline run
///
/// A coordinator is consumed by [`spawn`](Self::spawn); build a new one for
/// every file.
#[derive(Debug, Clone)]
pub struct PipelineCoordinator {
    config: PipelineConfig,
    registry: Arc<SchemaRegistry>,
}

/// Records and counters of a successful run
struct CompletedRun {
    data: Vec<DomainRecord>,
    summary: RunSummary,
}

/// Validation and output state of one file, fed a batch at a time
struct BatchProcessor {
    schema: Schema,
    detected: Granularity,
    output_granularity: Granularity,
    validator: RowValidator,
    output: RunOutput,
}

enum RunOutput {
    Aggregate(Aggregation),
    PassThrough(Vec<DomainRecord>),
}

impl BatchProcessor {
    fn consume(&mut self, rows: &[RawRecord]) -> Result<()> {
        self.validator.check_batch(rows, &self.schema)?;
        match &mut self.output {
            RunOutput::Aggregate(aggregation) => aggregation.add_rows(rows, &self.schema),
            RunOutput::PassThrough(records) => {
                records.extend(aggregator::pass_through(rows, &self.schema))
            }
        }
        Ok(())
    }

    fn finish(self) -> (Vec<DomainRecord>, ValidationSummary) {
        let data = match self.output {
            RunOutput::Aggregate(aggregation) => {
                let periods = aggregation.finish(&self.schema);
                aggregator::to_domain_records(&periods, self.schema.domain)
            }
            RunOutput::PassThrough(records) => records,
        };
        (data, self.validator.finish())
    }
}

/// Tokenized rows awaiting validation
///
/// The newest consumed rows are kept so previews can span a batch boundary.
#[derive(Default)]
struct RowBuffer {
    pending: Vec<RawRecord>,
    recent: Vec<RawRecord>,
    rows_read: usize,
}

impl RowBuffer {
    fn push(&mut self, batch: Vec<RawRecord>) {
        self.rows_read += batch.len();
        self.pending.extend(batch);
    }

    /// Copy of the last `count` rows read, oldest first
    fn newest(&self, count: usize) -> Vec<RawRecord> {
        let from_pending = self.pending.len().min(count);
        let from_recent = (count - from_pending).min(self.recent.len());
        self.recent[self.recent.len() - from_recent..]
            .iter()
            .chain(&self.pending[self.pending.len() - from_pending..])
            .cloned()
            .collect()
    }

    /// Hand out the pending rows, remembering the last `keep` of them
    fn take(&mut self, keep: usize) -> Vec<RawRecord> {
        self.recent = self.newest(keep);
        std::mem::take(&mut self.pending)
    }
}

impl PipelineCoordinator {
    /// Create a coordinator backed by the shared schema registry
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_registry(config, schema_registry::shared())
    }

    /// Create a coordinator backed by a specific registry
    pub fn with_registry(config: PipelineConfig, registry: Arc<SchemaRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start the run on a background task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self, file: Option<UploadFile>) -> PipelineHandle {
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let task = tokio::spawn(self.execute(file, sender));
        PipelineHandle::new(receiver, task)
    }

    /// Start the run and wait for its outcome
    pub async fn run(self, file: Option<UploadFile>) -> PipelineOutcome {
        self.spawn(file).outcome().await
    }

    async fn execute(self, file: Option<UploadFile>, sender: mpsc::Sender<PipelineMessage>) {
        let name = file
            .as_ref()
            .map(|file| file.name().to_string())
            .unwrap_or_default();

        let result = AssertUnwindSafe(self.process(file, &sender))
            .catch_unwind()
            .await;

        let terminal = match result {
            Ok(Ok(run)) => {
                info!(
                    "Completed {}: {} records from {} rows",
                    name, run.summary.records_emitted, run.summary.rows_read
                );
                PipelineMessage::Complete {
                    data: run.data,
                    summary: run.summary,
                }
            }
            Ok(Err(Error::ProcessingInterrupted { reason })) => {
                debug!("Run for {} interrupted: {}", name, reason);
                return;
            }
            Ok(Err(error)) => {
                warn!("Processing {} failed: {}", name, error);
                PipelineMessage::Error {
                    error: error.to_string(),
                }
            }
            Err(panic) => {
                error!("Pipeline for {} panicked: {}", name, panic_message(&*panic));
                PipelineMessage::Error {
                    error: Error::internal(PANIC_REASON).to_string(),
                }
            }
        };

        if sender.send(terminal).await.is_err() {
            debug!("Receiver dropped before the result of {} was delivered", name);
        }
    }

    async fn process(
        &self,
        file: Option<UploadFile>,
        sender: &mpsc::Sender<PipelineMessage>,
    ) -> Result<CompletedRun> {
        let file = file.ok_or(Error::NoFileProvided)?;
        debug!("Processing {} as {} data", file.name(), self.config.domain);

        send(sender, PipelineMessage::Stage {
            stage: PipelineStage::Tokenizing,
        })
        .await?;

        let mut tokenizer = CsvTokenizer::new();
        if self.config.normalize_headers {
            tokenizer = tokenizer.with_header_normalizer(canonical_column);
        }
        let mut stream =
            CsvTokenStream::with_tokenizer(file.into_reader(), tokenizer, self.config.chunk_size);

        let interval = self.config.progress_interval_rows;
        let preview_rows = self.config.preview_rows;
        let batch_rows = self.config.batch_rows.max(1);
        let mut next_preview = interval;
        let mut buffer = RowBuffer::default();
        let mut processor: Option<BatchProcessor> = None;

        while let Some(batch) = stream.next_batch().await? {
            if batch.is_empty() {
                continue;
            }
            buffer.push(batch);

            if interval > 0 && preview_rows > 0 && buffer.rows_read >= next_preview {
                send(sender, PipelineMessage::Chunk {
                    data: buffer.newest(preview_rows),
                })
                .await?;
                next_preview = (buffer.rows_read / interval + 1) * interval;
            }

            let ready = match processor.take() {
                Some(ready) => ready,
                None => {
                    let header = stream
                        .header()
                        .map(<[String]>::to_vec)
                        .ok_or(Error::EmptyOrHeaderOnlyFile)?;
                    self.prepare(&header, sender).await?
                }
            };

            processor = Some(if buffer.pending.len() >= batch_rows {
                consume(ready, buffer.take(preview_rows)).await?
            } else {
                ready
            });
        }

        let stats = stream.stats().clone();
        debug!(
            "Tokenized {} bytes into {} rows",
            stream.bytes_read(),
            buffer.rows_read
        );
        if stats.data_lines == 0 {
            return Err(Error::EmptyOrHeaderOnlyFile);
        }
        if stats.shape_mismatches > 0 {
            warn!(
                "Skipped {} rows whose field count differs from the header",
                stats.shape_mismatches
            );
        }

        // Every data line failed the shape check, so no batch prepared the run
        let ready = match processor {
            Some(ready) => ready,
            None => {
                let header = stream
                    .header()
                    .map(<[String]>::to_vec)
                    .ok_or(Error::EmptyOrHeaderOnlyFile)?;
                self.prepare(&header, sender).await?
            }
        };
        let ready = consume(ready, buffer.take(0)).await?;

        send(sender, PipelineMessage::Stage {
            stage: PipelineStage::Aggregating,
        })
        .await?;
        let detected = ready.detected;
        let output_granularity = ready.output_granularity;
        let (data, validation) = blocking(move || ready.finish()).await?;

        let summary = RunSummary {
            domain: self.config.domain,
            detected_granularity: detected,
            output_granularity,
            mode: self.config.mode,
            rows_read: buffer.rows_read,
            rows_skipped_shape: stats.shape_mismatches,
            rows_without_timestamp: validation.rows_without_timestamp,
            records_emitted: data.len(),
        };

        Ok(CompletedRun { data, summary })
    }

    /// Resolve the file's schema from its header and start validating
    async fn prepare(
        &self,
        header: &[String],
        sender: &mpsc::Sender<PipelineMessage>,
    ) -> Result<BatchProcessor> {
        send(sender, PipelineMessage::Stage {
            stage: PipelineStage::Validating,
        })
        .await?;

        let classification = classify(header)?;
        let detected = classification.granularity;
        if let Some(expected) = self.config.expected_granularity {
            if expected != detected {
                return Err(Error::GranularityMismatch { expected, detected });
            }
        }

        let schema = self.registry.lookup(self.config.domain, detected)?.clone();
        let (output_granularity, output) = match self.config.mode {
            PipelineMode::Aggregate => {
                let target = self.config.target_granularity.unwrap_or(detected);
                let aggregation = Aggregation::new(&schema, target)?;
                (target, RunOutput::Aggregate(aggregation))
            }
            PipelineMode::PassThrough => (detected, RunOutput::PassThrough(Vec::new())),
        };
        let validator = RowValidator::new(header, &schema)?;

        Ok(BatchProcessor {
            schema,
            detected,
            output_granularity,
            validator,
            output,
        })
    }
}

/// Validate and fold `rows` on the blocking pool
async fn consume(mut processor: BatchProcessor, rows: Vec<RawRecord>) -> Result<BatchProcessor> {
    if rows.is_empty() {
        return Ok(processor);
    }
    blocking(move || {
        let result = processor.consume(&rows);
        result.map(|()| processor)
    })
    .await?
}

async fn send(sender: &mpsc::Sender<PipelineMessage>, message: PipelineMessage) -> Result<()> {
    sender
        .send(message)
        .await
        .map_err(|_| Error::processing_interrupted("result receiver dropped"))
}

/// Run CPU-bound stage work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        if e.is_panic() {
            let payload = e.into_panic();
            error!("Blocking stage panicked: {}", panic_message(&*payload));
        }
        Error::internal(PANIC_REASON)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
