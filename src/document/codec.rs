//! YAML parsing and rendering.

use serde_yaml::Value;

/// Stateless YAML serializer shared by the loader and the writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl YamlCodec {
    pub fn new() -> Self {
        Self
    }

    /// Parse YAML text into a document tree. Empty text yields `Null`.
    pub fn parse(&self, text: &str) -> Result<Value, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Render a full document tree as YAML text.
    pub fn render(&self, document: &Value) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(document)
    }
}
