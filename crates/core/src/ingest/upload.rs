//! Receiving uploaded bytes into a scoped temp file.

use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::config::IngestConfig;
use crate::metrics::BYTES_RECEIVED;
use crate::progress::{IngestionStage, ProgressSink, ProgressUpdate};

use super::temp::ScopedTempFile;
use super::IngestError;

const MIB: f64 = 1024.0 * 1024.0;

/// Streams an inbound payload to disk, reporting progress in the 10..=30 band
/// when the payload size is known up front.
pub struct UploadStreamer {
    chunk_size: usize,
    temp_dir: Option<PathBuf>,
}

impl UploadStreamer {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size_bytes.max(1),
            temp_dir: config.temp_dir.clone(),
        }
    }

    /// Copy `reader` to a new temp file with the given suffix.
    ///
    /// Returns the file guard and the number of bytes received.
    pub async fn receive<R>(
        &self,
        mut reader: R,
        suffix: &str,
        expected_size: Option<u64>,
        sink: &dyn ProgressSink,
    ) -> Result<(ScopedTempFile, u64), IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let (temp, mut file) = ScopedTempFile::create(self.temp_dir.as_deref(), suffix)
            .map_err(|e| IngestError::Upload(format!("Failed to create temp file: {}", e)))?;

        let expected = expected_size.filter(|&s| s > 0);
        let mut buf = vec![0u8; self.chunk_size];
        let mut received: u64 = 0;

        loop {
            let n = read_chunk(&mut reader, &mut buf)
                .await
                .map_err(|e| IngestError::Upload(e.to_string()))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .await
                .map_err(|e| IngestError::Upload(e.to_string()))?;
            received += n as u64;

            if let Some(expected) = expected {
                debug!(received, expected, "Upload chunk");
                sink.report(
                    ProgressUpdate::new(
                        IngestionStage::Receiving,
                        receive_progress(received, expected),
                        format!("Received {:.1}MB", received as f64 / MIB),
                    )
                    .with_bytes(received, expected.max(received)),
                );
            }
        }

        file.flush()
            .await
            .map_err(|e| IngestError::Upload(e.to_string()))?;

        if received == 0 {
            return Err(IngestError::InvalidRequest("Uploaded file is empty".to_string()));
        }

        BYTES_RECEIVED.with_label_values(&["upload"]).inc_by(received);
        Ok((temp, received))
    }
}

/// Percent for `received` of `expected` bytes, within 10..=30.
pub fn receive_progress(received: u64, expected: u64) -> u8 {
    if expected == 0 {
        return 10;
    }
    10 + (received as u128 * 20 / expected as u128).min(20) as u8
}

/// Fill `buf` unless the reader hits EOF first.
async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
