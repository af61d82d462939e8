//! File-tree `CheckpointStorage`: one JSON file per checkpoint under
//! `<root>/checkpoints/`, written atomically (temp file + rename) so a
//! crash mid-write never leaves a half-written checkpoint on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::checkpoint::Checkpoint;

use super::{decode_from_storage, encode_for_storage, CheckpointStorage, StorageError, StorageResult};

pub struct FileTreeStorage {
    root: PathBuf,
}

impl FileTreeStorage {
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join("checkpoints")).await?;
        tokio::fs::create_dir_all(root.join("events")).await?;
        Ok(Self { root })
    }

    fn checkpoint_path(&self, checkpoint_id: &str) -> PathBuf {
        self.root.join("checkpoints").join(format!("{checkpoint_id}.json"))
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    /// Deletes checkpoint files whose `updated_at` is older than `max_age`,
    /// per the retention sweep in spec §4.8.
    pub async fn sweep_expired(&self, max_age: chrono::Duration) -> StorageResult<Vec<String>> {
        let dir = self.root.join("checkpoints");
        let cutoff = Utc::now() - max_age;
        let mut removed = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| StorageError::Io(err.into()))?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read(entry.path()).await?;
            let id_hint = entry.path().file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let checkpoint = match decode_from_storage(id_hint, &contents) {
                Ok(checkpoint) => checkpoint,
                Err(_) => continue,
            };
            if checkpoint.updated_at < cutoff {
                tokio::fs::remove_file(entry.path()).await?;
                removed.push(checkpoint.checkpoint_id);
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl CheckpointStorage for FileTreeStorage {
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let path = self.checkpoint_path(&checkpoint.checkpoint_id);
        let contents = encode_for_storage(checkpoint)?;
        self.write_atomic(&path, &contents).await
    }

    async fn load_checkpoint(&self, checkpoint_id: &str) -> StorageResult<Option<Checkpoint>> {
        let path = self.checkpoint_path(checkpoint_id);
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(decode_from_storage(checkpoint_id, &contents)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_checkpoint(&self, checkpoint_id: &str) -> StorageResult<()> {
        let path = self.checkpoint_path(checkpoint_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_checkpoints(
        &self,
        job_id: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Checkpoint>> {
        let dir = self.root.join("checkpoints");
        let mut checkpoints = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| StorageError::Io(err.into()))?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read(entry.path()).await?;
            let id_hint = entry.path().file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let checkpoint = match decode_from_storage(id_hint, &contents) {
                Ok(checkpoint) => checkpoint,
                Err(_) => continue,
            };
            if job_id.is_some_and(|job_id| job_id != checkpoint.job_id) {
                continue;
            }
            checkpoints.push(checkpoint);
        }
        checkpoints.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = limit {
            checkpoints.truncate(limit);
        }
        Ok(checkpoints)
    }
}
