//! Scoped temporary image files

use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

/// Image bytes materialized on disk for upload.
///
/// The file is removed when the value is dropped.
#[derive(Debug)]
pub struct TempImage {
    file: NamedTempFile,
    mime_type: String,
    size: usize,
}

impl TempImage {
    /// Write `bytes` to a fresh `.jpg` temp file, in `dir` when given
    pub async fn write(
        dir: Option<&Path>,
        bytes: &[u8],
        mime_type: impl Into<String>,
    ) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("relay-image-").suffix(".jpg");

        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        tokio::fs::write(file.path(), bytes).await?;

        Ok(Self {
            file,
            mime_type: mime_type.into(),
            size: bytes.len(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> usize {
        self.size
    }
}
