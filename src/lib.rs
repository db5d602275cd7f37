//! target-yaml: merge streamed records into a YAML document.
//!
//! Records of a stream are batched, then merged into a destination YAML
//! file at a configurable insertion point: appended to a sequence, or
//! inserted into a mapping keyed by a record property. The destination is
//! read, modified and rewritten as a whole on every flush.
//!
//! # Example
//!
//! ```ignore
//! use target_yaml::{Config, YamlSink, error::SinkError};
//!
//! fn main() -> Result<(), SinkError> {
//!     let mut config = Config::new("{stream_name}.yml");
//!     config.record_insert_jsonpath = "$.metrics".to_string();
//!     config.default_yaml_template = Some("metrics: {}".to_string());
//!     config.record_key_property_name = Some("id".to_string());
//!
//!     let mut sink = YamlSink::new("metrics", &config)?;
//!     sink.process_record(serde_yaml::from_str("{id: x, v: 1}").unwrap())?;
//!     let stats = sink.finish()?;
//!     println!("Wrote {} records", stats.records_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod metrics;
pub mod sink;

// Re-export main types
pub use config::{Config, OverwriteBehavior};
pub use document::{Document, InsertPath};
pub use sink::{Record, SinkState, SinkStats, YamlSink};
