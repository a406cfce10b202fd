use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siteask_core::{SiteaskError, SiteaskResult};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One audit line: a scoring call and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// When the score was recorded.
    pub recorded_at: DateTime<Utc>,
    /// The (decontextualized) query text.
    pub query: String,
    /// URL of the scored candidate.
    pub url: String,
    /// The score assigned (sentinel included, so failures audit too).
    pub score: f64,
    /// Cost attributed to the call.
    pub cost: f64,
}

/// Append-only JSONL audit log of scoring calls.
///
/// An explicit handle with a run-scoped lifecycle: the owner creates
/// it, threads it into the engine, and drops it when the run ends.
/// There is no process-wide recording switch.
pub struct ScoreRecorder {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl ScoreRecorder {
    /// Opens (creating if needed) the log at `path` for appending.
    pub async fn create(path: PathBuf) -> SiteaskResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                SiteaskError::Storage(format!("cannot open score log {}: {e}", path.display()))
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Appends one record.
    pub async fn record(&self, query: &str, url: &str, score: f64, cost: f64) -> SiteaskResult<()> {
        let record = ScoreRecord {
            recorded_at: Utc::now(),
            query: query.to_string(),
            url: url.to_string(),
            score,
            cost,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Flushes buffered writes to disk.
    pub async fn flush(&self) -> SiteaskResult<()> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        Ok(())
    }
}
