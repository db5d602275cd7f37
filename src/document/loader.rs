//! Produces the document tree a flush merges into.

use serde_yaml::Value;
use snafu::prelude::*;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use super::YamlCodec;
use crate::error::{
    DocumentError, MissingTemplateSnafu, ParseDocumentSnafu, ParseTemplateSnafu,
    ReadDocumentSnafu,
};

/// Loads the destination document or instantiates the template.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    codec: YamlCodec,
}

impl DocumentLoader {
    pub fn new(codec: YamlCodec) -> Self {
        Self { codec }
    }

    /// Load the document for `path`.
    ///
    /// The template is parsed when `force_template` is set or no file exists
    /// at `path`; in that case a missing template is an error. Otherwise the
    /// existing file is read and parsed.
    pub fn load(
        &self,
        path: &Path,
        template: Option<&str>,
        force_template: bool,
    ) -> Result<Value, DocumentError> {
        if !force_template {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    debug!(path = %path.display(), "Loading existing document");
                    return self
                        .codec
                        .parse(&content)
                        .context(ParseDocumentSnafu { path });
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e).context(ReadDocumentSnafu { path }),
            }
        }

        let template = template.context(MissingTemplateSnafu { path })?;
        debug!(
            path = %path.display(),
            force_template,
            "Instantiating document from template"
        );
        self.codec.parse(template).context(ParseTemplateSnafu)
    }
}
