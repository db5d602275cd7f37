//! Error types for target-yaml using snafu.
//!
//! Each component owns an error enum with context selectors. `SinkError`
//! aggregates them for a flush, and `RunError` adds the failures the
//! command-line driver can hit around it.

use snafu::prelude::*;
use std::path::PathBuf;

use crate::document::NodeShape;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// File naming scheme is empty.
    #[snafu(display("file_naming_scheme cannot be empty"))]
    EmptyNamingScheme,

    /// A strftime pattern contains a specifier chrono cannot format.
    #[snafu(display("{option} is not a valid strftime pattern: {format:?}"))]
    InvalidFormat { option: String, format: String },

    /// Timezone is not a known IANA zone name.
    #[snafu(display("timestamp_timezone is not a known IANA timezone: {name:?}"))]
    InvalidTimezone { name: String },

    /// The record insert path does not parse.
    #[snafu(display("record_insert_jsonpath is malformed"))]
    InvalidInsertPath { source: PathError },

    /// A batch size of zero would never accumulate records.
    #[snafu(display("max_batch_size must be greater than zero"))]
    ZeroBatchSize,

    /// `replace_file` needs a template to start from.
    #[snafu(display("overwrite_behavior replace_file requires default_yaml_template"))]
    ReplaceFileWithoutTemplate,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file {}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Path Errors ============

/// Errors raised while parsing or evaluating a path query.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PathError {
    /// The query text is not a valid path expression.
    #[snafu(display("Invalid path query {query:?} at byte {position}: {message}"))]
    PathSyntax {
        query: String,
        position: usize,
        message: String,
    },

    /// The query matched no node in the document.
    #[snafu(display("Path query {query:?} matched no node in the document"))]
    PathNotFound { query: String },
}

// ============ Document Errors ============

/// Errors that can occur while loading or writing the destination document.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DocumentError {
    /// No file exists (or replace_file is set) and no template is configured.
    #[snafu(display(
        "default_yaml_template is required: no usable document at {}",
        path.display()
    ))]
    MissingTemplate { path: PathBuf },

    /// Failed to read the existing destination file.
    #[snafu(display("Failed to read document {}", path.display()))]
    ReadDocument {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The existing destination file is not valid YAML.
    #[snafu(display("Failed to parse document {}", path.display()))]
    ParseDocument {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The configured template is not valid YAML.
    #[snafu(display("Failed to parse default_yaml_template"))]
    ParseTemplate { source: serde_yaml::Error },

    /// The document tree could not be rendered as YAML.
    #[snafu(display("Failed to serialize document"))]
    SerializeDocument { source: serde_yaml::Error },

    /// Failed to create the destination's parent directory.
    #[snafu(display("Failed to create directory {}", path.display()))]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the temporary document file.
    #[snafu(display("Failed to write document {}", path.display()))]
    WriteDocument {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move the temporary file over the destination.
    #[snafu(display("Failed to replace document {}", path.display()))]
    ReplaceDocument {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ============ Merge Errors ============

/// Errors raised by the record merger.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MergeError {
    /// Merge was called without records.
    #[snafu(display("Cannot merge an empty batch"))]
    EmptyBatch,

    /// A record lacks the sort or key property.
    #[snafu(display("Record {index} has no property {property:?}"))]
    MissingProperty { property: String, index: usize },

    /// The insertion node does not have the shape the reconciliation mode needs.
    #[snafu(display("Insertion node is a {found}, expected a {expected}"))]
    ShapeMismatch {
        expected: NodeShape,
        found: NodeShape,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Sink Error (per flush) ============

/// Coarse classification of a sink failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    PathNotFound,
    ShapeMismatch,
    Parse,
    MissingProperty,
    EmptyBatch,
    Io,
}

/// Errors surfaced by a sink flush. All of them are fatal for the stream.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Path resolution error.
    #[snafu(display("Cannot locate insertion point"))]
    Path { source: PathError },

    /// Document load or write error.
    #[snafu(display("Document error"))]
    Document { source: DocumentError },

    /// Record merge error.
    #[snafu(display("Failed to merge records at {query:?}"))]
    Merge { query: String, source: MergeError },

    /// A timestamp could not be rendered with the configured pattern.
    #[snafu(display("Failed to format timestamp with pattern {format:?}"))]
    FormatTimestamp { format: String },
}

impl SinkError {
    /// Map this error onto the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SinkError::Config { .. } | SinkError::FormatTimestamp { .. } => {
                ErrorKind::Configuration
            }
            SinkError::Path { source } => match source {
                PathError::PathSyntax { .. } => ErrorKind::Configuration,
                PathError::PathNotFound { .. } => ErrorKind::PathNotFound,
            },
            SinkError::Document { source } => match source {
                DocumentError::MissingTemplate { .. } => ErrorKind::Configuration,
                DocumentError::ParseDocument { .. } | DocumentError::ParseTemplate { .. } => {
                    ErrorKind::Parse
                }
                _ => ErrorKind::Io,
            },
            SinkError::Merge { source, .. } => match source {
                MergeError::EmptyBatch => ErrorKind::EmptyBatch,
                MergeError::MissingProperty { .. } => ErrorKind::MissingProperty,
                MergeError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            },
        }
    }
}

// ============ Run Error (top-level) ============

/// Top-level errors of the command-line driver.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RunError {
    /// Configuration could not be loaded.
    #[snafu(display("Configuration error"))]
    LoadConfig { source: ConfigError },

    /// The sink failed.
    #[snafu(display("Sink error for stream {stream:?}"))]
    Sink { stream: String, source: SinkError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Failed to read the record input.
    #[snafu(display("Failed to read records"))]
    ReadInput { source: std::io::Error },

    /// An input line is not a JSON object.
    #[snafu(display("Failed to decode record on line {line}"))]
    DecodeRecord {
        line: usize,
        source: serde_json::Error,
    },

    /// Failed to write the metrics exposition file.
    #[snafu(display("Failed to write metrics to {}", path.display()))]
    WriteMetrics {
        path: PathBuf,
        source: std::io::Error,
    },
}
