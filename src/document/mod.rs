//! In-memory YAML document handling.
//!
//! The document tree is a `serde_yaml::Value`: a tagged variant of
//! mappings, sequences and scalars whose shape is only known at runtime.
//! This module locates nodes inside it (`path`), produces it from a file
//! or template (`loader`) and persists it again (`writer`).

pub mod codec;
pub mod loader;
pub mod path;
pub mod writer;

pub use codec::YamlCodec;
pub use loader::DocumentLoader;
pub use path::InsertPath;
pub use writer::DocumentWriter;

use serde_yaml::Value;
use std::fmt;

/// The document tree.
pub type Document = Value;

/// Runtime shape of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Null,
    Scalar,
    Sequence,
    Mapping,
    Tagged,
}

impl NodeShape {
    /// Inspect the shape of a node.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => NodeShape::Null,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => NodeShape::Scalar,
            Value::Sequence(_) => NodeShape::Sequence,
            Value::Mapping(_) => NodeShape::Mapping,
            Value::Tagged(_) => NodeShape::Tagged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeShape::Null => "null",
            NodeShape::Scalar => "scalar",
            NodeShape::Sequence => "sequence",
            NodeShape::Mapping => "mapping",
            NodeShape::Tagged => "tagged value",
        }
    }
}

impl fmt::Display for NodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
