//! Retention sweep: deletes checkpoints past `max_age`, optionally
//! backing each one up first. A backup failure is logged and does not
//! block the deletion — retention must make forward progress even when
//! the backup target is unavailable.

use std::path::Path;

use chrono::{Duration, Utc};
use tracing::warn;

use crate::storage::CheckpointStorage;

use super::{Checkpoint, CheckpointResult};

pub struct RetentionPolicy {
    pub max_age: Duration,
    pub backup_before_delete: bool,
}

pub async fn sweep(
    storage: &dyn CheckpointStorage,
    backup_dir: Option<&Path>,
    policy: &RetentionPolicy,
) -> CheckpointResult<Vec<String>> {
    let cutoff = Utc::now() - policy.max_age;
    let checkpoints = storage.list_checkpoints(None, None).await?;
    let mut removed = Vec::new();

    for checkpoint in checkpoints {
        if checkpoint.updated_at >= cutoff {
            continue;
        }
        if policy.backup_before_delete {
            if let Some(dir) = backup_dir {
                if let Err(err) = backup_one(dir, &checkpoint).await {
                    warn!(
                        checkpoint_id = %checkpoint.checkpoint_id,
                        error = %err,
                        "checkpoint backup failed, proceeding with deletion"
                    );
                }
            }
        }
        storage.delete_checkpoint(&checkpoint.checkpoint_id).await?;
        removed.push(checkpoint.checkpoint_id);
    }

    Ok(removed)
}

async fn backup_one(dir: &Path, checkpoint: &Checkpoint) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.json", checkpoint.checkpoint_id));
    let contents = crate::storage::encode_for_storage(checkpoint)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()))?;
    tokio::fs::write(path, contents).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file_tree::FileTreeStorage;
    use serde_json::json;

    #[tokio::test]
    async fn sweep_removes_only_expired_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTreeStorage::open(dir.path()).await.unwrap();

        let mut old = Checkpoint::new("job-old", json!({}));
        old.updated_at = Utc::now() - Duration::days(30);
        storage.store_checkpoint(&old).await.unwrap();

        let fresh = Checkpoint::new("job-fresh", json!({}));
        storage.store_checkpoint(&fresh).await.unwrap();

        let policy = RetentionPolicy {
            max_age: Duration::days(7),
            backup_before_delete: false,
        };
        let removed = sweep(&storage, None, &policy).await.unwrap();
        assert_eq!(removed, vec![old.checkpoint_id]);
        assert!(storage
            .load_checkpoint(&fresh.checkpoint_id)
            .await
            .unwrap()
            .is_some());
    }
}
