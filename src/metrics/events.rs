//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the sink.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! metric through the `metrics` facade.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when records are accepted into a batch.
pub struct RecordsReceived<'a> {
    pub stream: &'a str,
    pub count: u64,
}

impl InternalEvent for RecordsReceived<'_> {
    fn emit(self) {
        trace!(stream = self.stream, count = self.count, "Records received");
        counter!("target_yaml_records_received_total", "stream" => self.stream.to_owned())
            .increment(self.count);
    }
}

/// Number of records waiting in the open batch.
pub struct PendingRecords<'a> {
    pub stream: &'a str,
    pub count: usize,
}

impl InternalEvent for PendingRecords<'_> {
    fn emit(self) {
        gauge!("target_yaml_pending_records", "stream" => self.stream.to_owned())
            .set(self.count as f64);
    }
}

/// Event emitted when records are merged into a document.
pub struct RecordsMerged {
    pub count: u64,
    pub mode: &'static str,
}

impl InternalEvent for RecordsMerged {
    fn emit(self) {
        trace!(count = self.count, mode = self.mode, "Records merged");
        counter!("target_yaml_records_merged_total", "mode" => self.mode).increment(self.count);
    }
}

/// Event emitted when a document is written to disk.
pub struct DocumentWritten {
    pub bytes: u64,
}

impl InternalEvent for DocumentWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, "Document written");
        counter!("target_yaml_documents_written_total").increment(1);
        counter!("target_yaml_bytes_written_total").increment(self.bytes);
    }
}

/// Event emitted when a flush finishes successfully.
pub struct FlushCompleted {
    pub duration: Duration,
}

impl InternalEvent for FlushCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis() as u64, "Flush completed");
        histogram!("target_yaml_flush_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Stage of a flush at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStage {
    Naming,
    Load,
    Locate,
    Merge,
    Write,
}

impl FlushStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushStage::Naming => "naming",
            FlushStage::Load => "load",
            FlushStage::Locate => "locate",
            FlushStage::Merge => "merge",
            FlushStage::Write => "write",
        }
    }
}

/// Event emitted when a flush fails.
pub struct FlushFailed {
    pub stage: FlushStage,
}

impl InternalEvent for FlushFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "Flush failed");
        counter!("target_yaml_flush_failures_total", "stage" => self.stage.as_str()).increment(1);
    }
}
