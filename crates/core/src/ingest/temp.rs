//! Scoped temporary files for in-flight media.

use std::io;
use std::path::Path;

use tempfile::TempPath;
use tracing::{debug, warn};

/// A temporary file deleted when the guard is dropped.
///
/// Deletion failures are logged and otherwise ignored: by the time the guard
/// drops, the session outcome has already been reported.
#[derive(Debug)]
pub struct ScopedTempFile {
    path: Option<TempPath>,
}

impl ScopedTempFile {
    /// Create an empty file in `dir` (system temp dir when `None`) and open it
    /// for writing.
    pub fn create(dir: Option<&Path>, suffix: &str) -> io::Result<(Self, tokio::fs::File)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mediaflow-").suffix(suffix);
        let named = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let (file, path) = named.into_parts();
        debug!(path = %path.display(), "Created temp file");
        Ok((Self { path: Some(path) }, tokio::fs::File::from_std(file)))
    }

    pub fn path(&self) -> &Path {
        // Only `drop` takes the path out.
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!(path = %shown, "Removed temp file"),
                Err(e) => warn!(path = %shown, error = %e, "Failed to remove temp file"),
            }
        }
    }
}
