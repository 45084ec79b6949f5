use crate::error::{BridgeError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A result file that was found and parsed.
#[derive(Debug, Clone)]
pub struct WatchReport {
    pub path: PathBuf,
    pub data: serde_json::Value,
    /// Existence checks performed, including the successful one.
    pub attempts: u32,
}

/// Polls for the simulator's output file with a bounded number of checks.
///
/// Process exit does not mean the file is visible yet: the simulator may
/// hand work off to children of its own.
pub struct ResultWatcher {
    path: PathBuf,
    interval: Duration,
    max_retries: u32,
}

impl ResultWatcher {
    pub fn new(path: impl Into<PathBuf>, interval: Duration, max_retries: u32) -> Self {
        Self {
            path: path.into(),
            interval,
            max_retries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait one interval before each check. Returns `Ok(None)` once `cancel`
    /// is observed; a cancelled watch never reports a result.
    pub async fn watch(&self, cancel: &AtomicBool) -> Result<Option<WatchReport>> {
        for attempt in 1..=self.max_retries {
            tokio::time::sleep(self.interval).await;
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!(path = %self.path.display(), attempt, "watch cancelled");
                return Ok(None);
            }

            match tokio::fs::try_exists(&self.path).await {
                Ok(true) => {
                    tracing::info!(path = %self.path.display(), attempt, "output file found");
                    let data = read_result_file(&self.path).await?;
                    return Ok(Some(WatchReport {
                        path: self.path.clone(),
                        data,
                        attempts: attempt,
                    }));
                }
                Ok(false) => {
                    tracing::trace!(path = %self.path.display(), attempt, "output file not there yet");
                }
                Err(e) => {
                    // Counted as a miss; permission trouble shows up when reading.
                    tracing::debug!(path = %self.path.display(), attempt, error = %e, "existence check failed");
                }
            }
        }

        tracing::error!(path = %self.path.display(), attempts = self.max_retries, "output file not found after waiting");
        Err(BridgeError::ResultTimeout {
            path: self.path.clone(),
            attempts: self.max_retries,
        })
    }
}

/// Read and parse a result file. Shared with on-demand loads.
pub async fn read_result_file(path: &Path) -> Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BridgeError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| BridgeError::ResultParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
