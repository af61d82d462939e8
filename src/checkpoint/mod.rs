//! Checkpoint Manager (spec §4.8): a small state machine over
//! serialized job progress, with a codec for the on-disk envelope
//! (checksum → compress → encrypt), corruption detection, schema
//! migration, and a retention sweep.

pub mod codec;
pub mod corruption;
pub mod migration;
pub mod retention;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub use corruption::{CorruptionReport, CorruptionSeverity, CorruptionType};
pub use migration::CURRENT_SCHEMA_VERSION;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("invalid checkpoint transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: CheckpointState,
        to: CheckpointState,
    },
    #[error("checkpoint is corrupted: {0}")]
    Corrupted(String),
    #[error("migration failed: {0}")]
    MigrationFailed(String),
    #[error("checkpoint {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointState {
    Creating,
    Active,
    Completed,
    Corrupted,
    Expired,
    Deleted,
}

impl CheckpointState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointState::Creating => "creating",
            CheckpointState::Active => "active",
            CheckpointState::Completed => "completed",
            CheckpointState::Corrupted => "corrupted",
            CheckpointState::Expired => "expired",
            CheckpointState::Deleted => "deleted",
        }
    }

    /// Creating→Active, Active→Completed, Active/Completed→Corrupted,
    /// Active→Expired, any→Deleted.
    fn can_transition_to(self, next: CheckpointState) -> bool {
        use CheckpointState::*;
        match (self, next) {
            (_, Deleted) => true,
            (Creating, Active) => true,
            (Active, Completed) => true,
            (Active, Corrupted) | (Completed, Corrupted) => true,
            (Active, Expired) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointType {
    Full,
    Incremental,
    Differential,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    None,
    Gzip,
    Lz4,
    Custom,
}

/// Free-form provenance carried alongside a checkpoint, elaborating the
/// bare `metadata` map spec.md names into the shape the original job
/// runner actually populated it with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub job_name: Option<String>,
    pub job_type: Option<String>,
    pub created_by: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub custom_fields: std::collections::HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub job_id: String,
    pub sequence_number: u64,
    /// Named `status` in spec.md; kept as `state` to match `CheckpointState`.
    pub state: CheckpointState,
    pub checkpoint_type: CheckpointType,
    pub compression: CompressionKind,
    pub encryption_enabled: bool,
    pub schema_version: String,
    pub metadata: CheckpointMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Job-specific payload, conventionally `{progress, state, configuration,
    /// metrics, artifacts}`; left untyped since shape is caller-defined.
    pub data: Value,
    /// `H(data)`, recomputed on every write and checked on every read.
    pub checksum: String,
    pub size_bytes: u64,
    pub compressed_size_bytes: Option<u64>,
    pub parent_checkpoint_id: Option<String>,
    pub child_checkpoint_ids: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: String,
    pub tags: Vec<String>,
}

/// `size_bytes` and `checksum` (`H(data)`, spec.md's data-model invariant)
/// both derive from the same canonical encoding of `data`, computed once.
fn fingerprint(data: &Value) -> (u64, String) {
    let canonical = serde_json::to_vec(data).unwrap_or_default();
    (canonical.len() as u64, codec::checksum(&canonical))
}

impl Checkpoint {
    pub fn new(job_id: impl Into<String>, data: Value) -> Self {
        let now = Utc::now();
        let (size_bytes, checksum) = fingerprint(&data);
        Self {
            checkpoint_id: Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            sequence_number: 0,
            state: CheckpointState::Active,
            checkpoint_type: CheckpointType::Full,
            compression: CompressionKind::None,
            encryption_enabled: false,
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            metadata: CheckpointMetadata::default(),
            created_at: now,
            updated_at: now,
            data,
            checksum,
            size_bytes,
            compressed_size_bytes: None,
            parent_checkpoint_id: None,
            child_checkpoint_ids: Vec::new(),
            expires_at: None,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    /// Chains `self` as the new checkpoint's parent, for the append-only
    /// DAG spec.md §3 describes (`children never precede parent in
    /// sequence number`).
    pub fn next_in_sequence(&self, data: Value) -> Self {
        let mut next = Self::new(self.job_id.clone(), data);
        next.sequence_number = self.sequence_number + 1;
        next.parent_checkpoint_id = Some(self.checkpoint_id.clone());
        next
    }

    pub fn transition(&mut self, next: CheckpointState) -> CheckpointResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CheckpointError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn update_data(&mut self, data: Value) -> CheckpointResult<()> {
        if self.state != CheckpointState::Active {
            return Err(CheckpointError::InvalidTransition {
                from: self.state,
                to: self.state,
            });
        }
        let (size_bytes, checksum) = fingerprint(&data);
        self.size_bytes = size_bytes;
        self.checksum = checksum;
        self.data = data;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Recomputes `H(data)` and compares against the stored `checksum`.
    /// Called on every load path before a checkpoint is handed back to a
    /// caller; a mismatch means `data` was altered without going through
    /// `update_data`.
    pub fn verify_checksum(&self) -> bool {
        fingerprint(&self.data).1 == self.checksum
    }

    /// Re-derives `size_bytes`/`checksum` from the current `data` without
    /// the `Active`-state guard `update_data` enforces. Used by schema
    /// migration, which mutates `data` on checkpoints in any state.
    pub(crate) fn refresh_fingerprint(&mut self) {
        let (size_bytes, checksum) = fingerprint(&self.data);
        self.size_bytes = size_bytes;
        self.checksum = checksum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_checkpoint_cannot_reactivate() {
        let mut checkpoint = Checkpoint::new("job-1", Value::Null);
        checkpoint.transition(CheckpointState::Completed).unwrap();
        let err = checkpoint.transition(CheckpointState::Active).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidTransition { .. }));
    }

    #[test]
    fn any_state_can_be_deleted() {
        let mut checkpoint = Checkpoint::new("job-1", Value::Null);
        checkpoint.transition(CheckpointState::Completed).unwrap();
        assert!(checkpoint.transition(CheckpointState::Deleted).is_ok());
    }

    #[test]
    fn inactive_checkpoint_rejects_data_update() {
        let mut checkpoint = Checkpoint::new("job-1", Value::Null);
        checkpoint.transition(CheckpointState::Completed).unwrap();
        assert!(checkpoint.update_data(Value::Null).is_err());
    }

    #[test]
    fn checksum_tracks_data_and_detects_tampering() {
        let mut checkpoint = Checkpoint::new("job-1", serde_json::json!({"progress": 1}));
        assert!(checkpoint.verify_checksum());

        checkpoint
            .update_data(serde_json::json!({"progress": 2}))
            .unwrap();
        assert!(checkpoint.verify_checksum());

        checkpoint.data = serde_json::json!({"progress": 3});
        assert!(!checkpoint.verify_checksum());
    }
}
