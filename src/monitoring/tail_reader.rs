//! Follows a growing log file, `tail -f` style
//!
//! - Waits for the file to exist before opening it
//! - Seeks to the end of seekable files so history is not replayed
//! - Reads pipes/FIFOs from wherever the stream currently is
//! - Treats EOF as "no data yet", never as end of stream
//!
//! Rotation (truncate or replace) is not detected.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

use crate::monitoring::poll::PollRetry;
use crate::utils::AppError;

pub struct TailReader {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes of a line whose newline has not been written yet
    pending: Vec<u8>,
    seekable: bool,
}

impl TailReader {
    /// Wait for `path` to exist, then open it positioned for tailing
    pub async fn open(path: impl AsRef<Path>, retry: &PollRetry) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        info!(log_file = %path.display(), "Waiting for log file");
        retry
            .until(|attempt| {
                let path = path.clone();
                async move {
                    // An unreadable path is "not there yet", same as a missing one
                    let exists = match tokio::fs::try_exists(&path).await {
                        Ok(exists) => exists,
                        Err(e) => {
                            warn!(
                                log_file = %path.display(),
                                attempt = attempt,
                                error = %e,
                                "Failed to check log file, waiting..."
                            );
                            return Ok(None);
                        }
                    };
                    if !exists && attempt == 1 {
                        info!(log_file = %path.display(), "Log file not found, waiting...");
                    } else if !exists {
                        debug!(attempt = attempt, "Log file still missing");
                    }
                    Ok::<_, AppError>(exists.then_some(()))
                }
            })
            .await?;

        Self::open_existing(path).await
    }

    /// Open a file that is known to exist
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let mut file = File::open(&path)
            .await
            .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?;

        let seekable = match file.seek(SeekFrom::End(0)).await {
            Ok(offset) => {
                info!(log_file = %path.display(), offset = offset, "File is seekable, tailing from end");
                true
            }
            Err(e) => {
                warn!(
                    log_file = %path.display(),
                    error = %e,
                    "File is not seekable (pipe/fifo), reading from current position"
                );
                false
            }
        };

        Ok(Self {
            path,
            reader: BufReader::new(file),
            pending: Vec::new(),
            seekable,
        })
    }

    /// Next complete line without its line terminator, or `None` if no
    /// complete line is available yet
    pub async fn read_line(&mut self) -> Result<Option<String>, AppError> {
        let read = self
            .reader
            .read_until(b'\n', &mut self.pending)
            .await
            .map_err(|e| AppError::io(format!("Failed to read {}", self.path.display()), e))?;

        if read == 0 || self.pending.last() != Some(&b'\n') {
            // EOF, possibly mid-line: keep the partial bytes for the next call
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.pending);
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }

        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Block until the next complete line, polling on EOF
    pub async fn next_line(&mut self, retry: &PollRetry) -> Result<String, AppError> {
        loop {
            if let Some(line) = self.read_line().await? {
                return Ok(line);
            }
            retry.wait().await;
        }
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
