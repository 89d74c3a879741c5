//! Append-only destination files, one per resolved identity.

use super::PipelineError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Writes grouped lines to `<root>/<identity>.csv`.
///
/// Appends to the same file are serialized by a per-file lock; appends to
/// different files proceed in parallel.
#[derive(Debug)]
pub struct DestinationSink {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

/// Lower-case `identity` and replace anything outside `[a-z0-9._-]`.
pub fn file_stem(identity: &str) -> String {
    identity
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl DestinationSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Destination file for `identity`.
    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.root.join(format!("{}.csv", file_stem(identity)))
    }

    /// Create the output folder.
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| PipelineError::Setup {
                path: self.root.clone(),
                source,
            })
    }

    async fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append `lines` as one contiguous block. Returns the number written.
    ///
    /// On a failed write the file is truncated back to its previous length.
    pub async fn append(&self, identity: &str, lines: &[String]) -> Result<usize, PipelineError> {
        if lines.is_empty() {
            return Ok(0);
        }

        let path = self.path_for(identity);
        let mut block = lines.join("\n");
        block.push('\n');

        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;

        let write_err = |source| PipelineError::Write {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        let previous_len = file.metadata().await.map_err(write_err)?.len();

        let written = async {
            file.write_all(block.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            error!("Append to {} failed, rolling back: {}", path.display(), e);
            if let Err(rollback) = file.set_len(previous_len).await {
                error!("Rollback of {} failed: {}", path.display(), rollback);
            }
            return Err(write_err(e));
        }

        debug!("Appended {} lines to {}", lines.len(), path.display());
        Ok(lines.len())
    }
}
