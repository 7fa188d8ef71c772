use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Append-only invocation log: one human-readable line per served query.
///
/// Appends are serialized through a single lock so concurrent connection
/// tasks cannot interleave partial lines.
pub struct Journal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Journal {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, line: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal file: {}", self.path.display()))?;

        file.write_all(format!("{line}\n").as_bytes())
            .await
            .with_context(|| format!("Failed to append to journal: {}", self.path.display()))?;
        // Tokio file writes complete on a background task; flush before the
        // lock is released so the line is on disk when append returns.
        file.flush()
            .await
            .with_context(|| format!("Failed to flush journal: {}", self.path.display()))?;
        Ok(())
    }

    /// Journal writes never abort the query that triggered them; a failed
    /// append is reported and dropped.
    pub async fn append_best_effort(&self, line: &str) {
        if let Err(e) = self.append(line).await {
            warn!("Journal append failed: {e:#}");
        }
    }
}
