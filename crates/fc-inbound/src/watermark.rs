//! Persisted poll watermark, durable via a write-then-rename policy.
//!
//! A missing or corrupt watermark file aborts startup rather than silently
//! defaulting to "now" or the epoch — replaying from an unknown point could
//! either flood the gateway with a full historical fetch or skip messages,
//! and neither is a safe default to pick on the poller's behalf.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("watermark file not found at {0}")]
    NotFound(String),

    #[error("watermark io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watermark file is corrupt: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn read(&self) -> std::result::Result<DateTime<Utc>, WatermarkError>;
    async fn write(&self, value: DateTime<Utc>) -> std::result::Result<(), WatermarkError>;
}

#[derive(Serialize, Deserialize)]
struct WatermarkFile {
    last_update_time: DateTime<Utc>,
}

/// Write-then-rename file store, same durability pattern as the encrypted
/// secrets provider's on-disk cache.
pub struct JsonFileWatermarkStore {
    path: PathBuf,
}

impl JsonFileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WatermarkStore for JsonFileWatermarkStore {
    async fn read(&self) -> std::result::Result<DateTime<Utc>, WatermarkError> {
        if !self.path.exists() {
            return Err(WatermarkError::NotFound(self.path.display().to_string()));
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Err(WatermarkError::Corrupt(format!(
                "{} is empty",
                self.path.display()
            )));
        }

        let parsed: WatermarkFile = serde_json::from_str(&content)
            .map_err(|e| WatermarkError::Corrupt(format!("{}: {e}", self.path.display())))?;
        Ok(parsed.last_update_time)
    }

    async fn write(&self, value: DateTime<Utc>) -> std::result::Result<(), WatermarkError> {
        let content = serde_json::to_string(&WatermarkFile {
            last_update_time: value,
        })
        .expect("watermark serialization is infallible");

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!(path = %self.path.display(), "watermark persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_watermark_file_aborts_with_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileWatermarkStore::new(dir.path().join("missing.json"));
        let result = store.read().await;
        assert!(matches!(result, Err(WatermarkError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_watermark_file_is_corrupt_not_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermark.json");
        tokio::fs::write(&path, "").await.unwrap();
        let store = JsonFileWatermarkStore::new(path);
        let result = store.read().await;
        assert!(matches!(result, Err(WatermarkError::Corrupt(_))));
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileWatermarkStore::new(dir.path().join("watermark.json"));
        let now = Utc::now();
        store.write(now).await.unwrap();
        let read_back = store.read().await.unwrap();
        assert_eq!(read_back.timestamp_millis(), now.timestamp_millis());
    }
}
