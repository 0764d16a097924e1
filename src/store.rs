// SPDX-License-Identifier: Apache-2.0
//! Durable record of accepted submissions.
//!
//! The contact path only ever appends. `load_all` exists for read-back
//! (audits, tests); there is no update or delete.

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::submission::Submission;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Append-only collection of submissions.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Durably append one submission after all existing ones.
    async fn append(&self, submission: &Submission) -> Result<(), StorageError>;

    /// Every stored submission, oldest first.
    async fn load_all(&self) -> Result<Vec<Submission>, StorageError>;
}

/// Build the configured store.
pub fn from_config(config: &StoreConfig) -> Arc<dyn SubmissionStore> {
    match config {
        StoreConfig::File { path } => {
            info!(path = %path.display(), "Recording submissions to JSON file");
            Arc::new(JsonFileStore::new(path.clone()))
        }
        StoreConfig::Memory => {
            info!("Recording submissions in memory only");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Submissions kept as a pretty-printed JSON array in one file.
///
/// Each append reads the array, pushes, writes a sibling temp file and
/// renames it over the original, all while holding `lock`. Readers therefore
/// see either the old or the new array, never a partial write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<Submission>, StorageError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|err| {
            StorageError::Corrupt(format!("{}: {err}", self.path.display()))
        })
    }

    async fn write_records(&self, records: &[Submission]) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(records)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &encoded).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "submissions".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SubmissionStore for JsonFileStore {
    async fn append(&self, submission: &Submission) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;
        records.push(submission.clone());
        self.write_records(&records).await?;
        debug!(id = %submission.id(), total = records.len(), "Submission appended");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Submission>, StorageError> {
        let _guard = self.lock.lock().await;
        self.read_records().await
    }
}

/// In-process store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn append(&self, submission: &Submission) -> Result<(), StorageError> {
        self.records.write().await.push(submission.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Submission>, StorageError> {
        Ok(self.records.read().await.clone())
    }
}
