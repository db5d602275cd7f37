//! Persists the document tree to its destination file.

use serde_yaml::Value;
use snafu::prelude::*;
use std::path::{Path, PathBuf};

use super::YamlCodec;
use crate::emit;
use crate::error::{
    CreateDirectorySnafu, DocumentError, ReplaceDocumentSnafu, SerializeDocumentSnafu,
    WriteDocumentSnafu,
};
use crate::metrics::events::DocumentWritten;

/// Writes whole documents to disk.
#[derive(Debug, Clone, Default)]
pub struct DocumentWriter {
    codec: YamlCodec,
}

impl DocumentWriter {
    pub fn new(codec: YamlCodec) -> Self {
        Self { codec }
    }

    /// Serialize the full document and replace the file at `path`.
    ///
    /// Content goes to `{path}.tmp` first and is renamed over `path`, so the
    /// destination is either the old or the new document. Returns the number
    /// of bytes written.
    pub fn write(&self, document: &Value, path: &Path) -> Result<usize, DocumentError> {
        let content = self.codec.render(document).context(SerializeDocumentSnafu)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(CreateDirectorySnafu { path: parent })?;
        }

        let temp_path = temp_path_for(path);
        std::fs::write(&temp_path, content.as_bytes()).context(WriteDocumentSnafu {
            path: &temp_path,
        })?;
        if let Err(source) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(source).context(ReplaceDocumentSnafu { path });
        }

        emit!(DocumentWritten {
            bytes: content.len() as u64
        });
        Ok(content.len())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
