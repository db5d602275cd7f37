//! target-yaml: merge a stream of JSON records into a YAML document.
//!
//! Reads one JSON object per line from a file or stdin, feeds the records to
//! the stream's sink and flushes at end of input.

use clap::Parser;
use snafu::prelude::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use target_yaml::error::{
    DecodeRecordSnafu, LoadConfigSnafu, MetricsSnafu, ReadInputSnafu, RunError, SinkSnafu,
    WriteMetricsSnafu,
};
use target_yaml::{Config, Record, SinkStats, YamlSink, metrics};

/// Stream JSON records into a YAML document.
#[derive(Parser, Debug)]
#[command(name = "target-yaml")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML or JSON).
    #[arg(short, long)]
    config: PathBuf,

    /// Name of the stream the records belong to.
    #[arg(short, long)]
    stream: String,

    /// NDJSON file with one record per line (default: stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration and print the destination path.
    #[arg(long)]
    dry_run: bool,

    /// Write Prometheus metrics in text format to this file on exit.
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

#[snafu::report]
fn main() -> Result<(), RunError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!("target-yaml starting");

    let config = Config::from_file(&args.config).context(LoadConfigSnafu)?;
    let stream = args.stream.clone();
    let sink = YamlSink::new(&stream, &config).context(SinkSnafu { stream: &stream })?;

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        let destination = sink
            .destination()
            .context(SinkSnafu { stream: &stream })?;
        info!("Stream: {}", stream);
        info!("Destination: {}", destination.display());
        info!("Insert path: {}", config.record_insert_jsonpath);
        info!("Overwrite behavior: {}", config.overwrite_behavior.as_str());
        info!("Configuration is valid");
        return Ok(());
    }

    let recorder = match &args.metrics_file {
        Some(_) => Some(metrics::init().context(MetricsSnafu)?),
        None => None,
    };

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path).context(ReadInputSnafu)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stats = run(sink, reader)?;

    info!("Stream completed successfully");
    info!("  Records received: {}", stats.records_received);
    info!("  Records written: {}", stats.records_written);
    info!("  Flushes: {}", stats.flushes);
    info!("  Bytes written: {}", stats.bytes_written);

    if let (Some(handle), Some(path)) = (recorder, &args.metrics_file) {
        std::fs::write(path, handle.render()).context(WriteMetricsSnafu { path })?;
        debug!("Metrics written to {}", path.display());
    }

    Ok(())
}

/// Feed every input line to the sink and flush at end of input.
fn run(mut sink: YamlSink, reader: impl BufRead) -> Result<SinkStats, RunError> {
    let stream = sink.stream_name().to_string();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context(ReadInputSnafu)?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record =
            serde_json::from_str(&line).context(DecodeRecordSnafu { line: index + 1 })?;
        sink.process_record(record)
            .context(SinkSnafu { stream: &stream })?;
    }

    sink.finish().context(SinkSnafu { stream: &stream })
}
