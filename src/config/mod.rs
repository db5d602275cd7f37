//! Configuration parsing and validation.
//!
//! Handles loading the sink configuration from a YAML (or JSON) file with
//! environment variable interpolation, and validates every option before a
//! sink is built from it.

mod vars;

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::document::InsertPath;
use crate::error::{
    ConfigError, EmptyNamingSchemeSnafu, EnvInterpolationSnafu, InvalidFormatSnafu,
    InvalidInsertPathSnafu, InvalidTimezoneSnafu, ReadFileSnafu,
    ReplaceFileWithoutTemplateSnafu, YamlParseSnafu, ZeroBatchSizeSnafu,
};

/// How new records reconcile with content already in the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteBehavior {
    /// Add records to the insertion node, keeping what is there.
    #[default]
    AppendRecords,
    /// Clear the insertion node before adding records.
    ReplaceRecords,
    /// Start from the template, ignoring any existing file.
    ReplaceFile,
}

impl OverwriteBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverwriteBehavior::AppendRecords => "append_records",
            OverwriteBehavior::ReplaceRecords => "replace_records",
            OverwriteBehavior::ReplaceFile => "replace_file",
        }
    }
}

/// Main configuration structure for the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Destination path pattern. May contain `{stream_name}`, `{datestamp}`
    /// and `{timestamp}`.
    pub file_naming_scheme: String,

    /// strftime pattern for `{datestamp}` (default: "%Y-%m-%d").
    #[serde(default = "default_datestamp_format")]
    pub datestamp_format: String,

    /// strftime pattern for `{timestamp}` (default: "%Y-%m-%d.T%H%M%S").
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// IANA timezone the datestamp and timestamp are rendered in (default: "UTC").
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,

    /// Path query addressing the insertion node (default: the document root).
    #[serde(default = "default_record_insert_jsonpath")]
    pub record_insert_jsonpath: String,

    #[serde(default)]
    pub overwrite_behavior: OverwriteBehavior,

    /// Document content used when no destination file exists.
    #[serde(default)]
    pub default_yaml_template: Option<String>,

    /// Sort records ascending by this property before merging.
    #[serde(default)]
    pub record_sort_property_name: Option<String>,

    /// Merge records into a mapping keyed by this property.
    #[serde(default)]
    pub record_key_property_name: Option<String>,

    /// Flush after this many records (default: the whole stream in one flush).
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

fn default_datestamp_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d.T%H%M%S".to_string()
}

fn default_timestamp_timezone() -> String {
    "UTC".to_string()
}

fn default_record_insert_jsonpath() -> String {
    "$".to_string()
}

impl Config {
    /// Build a config with defaults for everything but the naming scheme.
    pub fn new(file_naming_scheme: impl Into<String>) -> Self {
        Self {
            file_naming_scheme: file_naming_scheme.into(),
            datestamp_format: default_datestamp_format(),
            timestamp_format: default_timestamp_format(),
            timestamp_timezone: default_timestamp_timezone(),
            record_insert_jsonpath: default_record_insert_jsonpath(),
            overwrite_behavior: OverwriteBehavior::default(),
            default_yaml_template: None,
            record_sort_property_name: None,
            record_key_property_name: None,
            max_batch_size: None,
        }
    }

    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a file with optional environment variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;

        let content = if interpolate_env {
            let result = vars::interpolate(&content);
            if !result.is_ok() {
                let error_msg = result.errors.join("\n");
                return EnvInterpolationSnafu { message: error_msg }.fail();
            }
            result.text
        } else {
            content
        };

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.file_naming_scheme.is_empty(), EmptyNamingSchemeSnafu);
        validate_format("datestamp_format", &self.datestamp_format)?;
        validate_format("timestamp_format", &self.timestamp_format)?;
        self.timezone()?;
        self.insert_path()?;
        ensure!(self.max_batch_size != Some(0), ZeroBatchSizeSnafu);
        ensure!(
            self.overwrite_behavior != OverwriteBehavior::ReplaceFile
                || self.default_yaml_template.is_some(),
            ReplaceFileWithoutTemplateSnafu
        );
        Ok(())
    }

    /// The configured timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timestamp_timezone
            .parse::<Tz>()
            .ok()
            .context(InvalidTimezoneSnafu {
                name: &self.timestamp_timezone,
            })
    }

    /// The parsed insertion path.
    pub fn insert_path(&self) -> Result<InsertPath, ConfigError> {
        InsertPath::parse(&self.record_insert_jsonpath).context(InvalidInsertPathSnafu)
    }
}

/// Reject strftime patterns chrono would fail to render.
fn validate_format(option: &str, format: &str) -> Result<(), ConfigError> {
    let valid = StrftimeItems::new(format).all(|item| !matches!(item, Item::Error));
    ensure!(valid, InvalidFormatSnafu { option, format });
    Ok(())
}
