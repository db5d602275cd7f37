//! Per-stream sink controller.
//!
//! A `YamlSink` accumulates the records of one stream into a batch and, on
//! flush, runs the batch through naming, loading, path resolution, merging
//! and writing:
//!
//! ```text
//! Idle --record--> Batching --flush / max_batch_size--> Flushing --> Idle
//! ```
//!
//! Any failure while flushing is fatal for the stream and is returned to
//! the caller without retry.

pub mod merge;
pub mod naming;

pub use merge::{MergePolicy, ReconcileMode, Record, merge};
pub use naming::{NamingScheme, Substitutions, resolve_path};

use chrono::{DateTime, Utc};
use snafu::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{Config, OverwriteBehavior};
use crate::document::{DocumentLoader, DocumentWriter, InsertPath, YamlCodec};
use crate::emit;
use crate::error::{ConfigSnafu, DocumentSnafu, MergeSnafu, PathSnafu, SinkError};
use crate::metrics::events::{
    FlushCompleted, FlushFailed, FlushStage, PendingRecords, RecordsReceived,
};

/// Lifecycle state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// No batch open.
    Idle,
    /// Accumulating records.
    Batching,
    /// Merging the batch into the destination.
    Flushing,
}

/// Statistics about a sink's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SinkStats {
    pub records_received: usize,
    pub records_written: usize,
    pub flushes: usize,
    pub bytes_written: usize,
}

/// Result of one successful flush.
#[derive(Debug, Clone)]
pub struct FlushOutcome {
    pub path: PathBuf,
    pub records: usize,
    pub bytes: usize,
}

/// Records accumulated since the last flush, with the time the batch opened.
#[derive(Debug)]
pub struct BatchContext {
    opened_at: DateTime<Utc>,
    records: Vec<Record>,
}

impl BatchContext {
    fn open(opened_at: DateTime<Utc>) -> Self {
        Self {
            opened_at,
            records: Vec::new(),
        }
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Writes one stream's records into a YAML document.
pub struct YamlSink {
    stream_name: String,
    naming: NamingScheme,
    insert_path: InsertPath,
    policy: MergePolicy,
    template: Option<String>,
    max_batch_size: Option<usize>,
    loader: DocumentLoader,
    writer: DocumentWriter,
    clock: fn() -> DateTime<Utc>,
    state: SinkState,
    batch: Option<BatchContext>,
    /// Destinations this sink already wrote; later batches append to them.
    written: HashSet<PathBuf>,
    stats: SinkStats,
}

impl YamlSink {
    /// Create a sink for `stream_name` from a configuration.
    pub fn new(stream_name: impl Into<String>, config: &Config) -> Result<Self, SinkError> {
        config.validate().context(ConfigSnafu)?;
        let codec = YamlCodec::new();

        Ok(Self {
            stream_name: stream_name.into(),
            naming: NamingScheme::from_config(config).context(ConfigSnafu)?,
            insert_path: config.insert_path().context(ConfigSnafu)?,
            policy: MergePolicy::from_config(config),
            template: config.default_yaml_template.clone(),
            max_batch_size: config.max_batch_size,
            loader: DocumentLoader::new(codec),
            writer: DocumentWriter::new(codec),
            clock: Utc::now,
            state: SinkState::Idle,
            batch: None,
            written: HashSet::new(),
            stats: SinkStats::default(),
        })
    }

    /// Replace the clock used to timestamp batches.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Number of records waiting in the open batch.
    pub fn pending(&self) -> usize {
        self.batch.as_ref().map_or(0, BatchContext::len)
    }

    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    /// The destination a batch opened now would write to.
    pub fn destination(&self) -> Result<PathBuf, SinkError> {
        self.naming.resolve(&self.stream_name, (self.clock)())
    }

    /// Add a record to the current batch, opening one if needed.
    ///
    /// Flushes when the batch reaches `max_batch_size`.
    pub fn process_record(&mut self, record: Record) -> Result<Option<FlushOutcome>, SinkError> {
        let clock = self.clock;
        let batch = self.batch.get_or_insert_with(|| {
            debug!("Opening batch");
            BatchContext::open(clock())
        });
        batch.records.push(record);
        let pending = batch.len();
        self.state = SinkState::Batching;
        self.stats.records_received += 1;

        emit!(RecordsReceived {
            stream: &self.stream_name,
            count: 1
        });
        emit!(PendingRecords {
            stream: &self.stream_name,
            count: pending
        });

        if self.max_batch_size.is_some_and(|max| pending >= max) {
            return self.flush();
        }
        Ok(None)
    }

    /// Flush the open batch, if any.
    pub fn flush(&mut self) -> Result<Option<FlushOutcome>, SinkError> {
        let Some(batch) = self.batch.take() else {
            return Ok(None);
        };

        self.state = SinkState::Flushing;
        let result = self.flush_batch(batch);
        self.state = SinkState::Idle;
        emit!(PendingRecords {
            stream: &self.stream_name,
            count: 0
        });

        result.map(Some)
    }

    /// Flush remaining records at end of stream and return the statistics.
    pub fn finish(mut self) -> Result<SinkStats, SinkError> {
        self.flush()?;
        Ok(self.stats)
    }

    fn flush_batch(&mut self, batch: BatchContext) -> Result<FlushOutcome, SinkError> {
        let start = Instant::now();
        let record_count = batch.len();

        let path = self
            .naming
            .resolve(&self.stream_name, batch.opened_at)
            .inspect_err(|_| emit!(FlushFailed { stage: FlushStage::Naming }))?;

        // Replacement applies to what was there before this sink, not to
        // the sink's own earlier batches.
        let policy = if self.written.contains(&path) {
            self.policy.appending()
        } else {
            self.policy.clone()
        };
        let force_template = policy.behavior == OverwriteBehavior::ReplaceFile;

        let mut document = self
            .loader
            .load(&path, self.template.as_deref(), force_template)
            .context(DocumentSnafu)
            .inspect_err(|_| emit!(FlushFailed { stage: FlushStage::Load }))?;

        let node = self
            .insert_path
            .resolve_mut(&mut document)
            .context(PathSnafu)
            .inspect_err(|_| emit!(FlushFailed { stage: FlushStage::Locate }))?;

        let merged = merge(node, batch.records, &policy)
            .context(MergeSnafu {
                query: self.insert_path.as_str(),
            })
            .inspect_err(|_| emit!(FlushFailed { stage: FlushStage::Merge }))?;

        let bytes = self
            .writer
            .write(&document, &path)
            .context(DocumentSnafu)
            .inspect_err(|_| emit!(FlushFailed { stage: FlushStage::Write }))?;

        self.written.insert(path.clone());
        self.stats.records_written += merged;
        self.stats.flushes += 1;
        self.stats.bytes_written += bytes;

        let duration = start.elapsed();
        emit!(FlushCompleted { duration });
        info!(
            stream = %self.stream_name,
            path = %path.display(),
            records = record_count,
            behavior = policy.behavior.as_str(),
            mode = policy.mode().as_str(),
            duration_ms = duration.as_millis() as u64,
            "Flushed batch"
        );

        Ok(FlushOutcome {
            path,
            records: merged,
            bytes,
        })
    }
}
