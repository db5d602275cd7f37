//! Destination file naming.
//!
//! Resolves the configured naming scheme into a path by literal substitution
//! of `{stream_name}`, `{datestamp}` and `{timestamp}`. Unknown placeholders
//! are left verbatim.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use snafu::prelude::*;
use std::fmt::Write;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{ConfigError, FormatTimestampSnafu, SinkError};

pub const STREAM_NAME: &str = "{stream_name}";
pub const DATESTAMP: &str = "{datestamp}";
pub const TIMESTAMP: &str = "{timestamp}";

/// Values substituted into the naming scheme for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitutions {
    pub stream_name: String,
    pub datestamp: String,
    pub timestamp: String,
}

/// Substitute placeholders in `pattern`. No existence check is made.
pub fn resolve_path(pattern: &str, substitutions: &Substitutions) -> PathBuf {
    let resolved = pattern
        .replace(STREAM_NAME, &substitutions.stream_name)
        .replace(DATESTAMP, &substitutions.datestamp)
        .replace(TIMESTAMP, &substitutions.timestamp);
    PathBuf::from(resolved)
}

/// The naming-related part of the configuration, validated.
#[derive(Debug, Clone)]
pub struct NamingScheme {
    pattern: String,
    datestamp_format: String,
    timestamp_format: String,
    timezone: Tz,
}

impl NamingScheme {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: config.file_naming_scheme.clone(),
            datestamp_format: config.datestamp_format.clone(),
            timestamp_format: config.timestamp_format.clone(),
            timezone: config.timezone()?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render the substitution values for a batch opened at `now`.
    pub fn substitutions(
        &self,
        stream_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Substitutions, SinkError> {
        let local = now.with_timezone(&self.timezone);
        Ok(Substitutions {
            stream_name: stream_name.to_string(),
            datestamp: render(&local, &self.datestamp_format)?,
            timestamp: render(&local, &self.timestamp_format)?,
        })
    }

    /// Resolve the destination path for a batch opened at `now`.
    pub fn resolve(&self, stream_name: &str, now: DateTime<Utc>) -> Result<PathBuf, SinkError> {
        let substitutions = self.substitutions(stream_name, now)?;
        Ok(resolve_path(&self.pattern, &substitutions))
    }
}

fn render(time: &DateTime<Tz>, format: &str) -> Result<String, SinkError> {
    let mut out = String::new();
    write!(out, "{}", time.format(format))
        .ok()
        .context(FormatTimestampSnafu { format })?;
    Ok(out)
}
