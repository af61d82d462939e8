//! Storage backends for telemetry events and checkpoints (spec §4.7/§4.8).
//! Two small traits so the Telemetry Collector and Checkpoint Manager
//! never depend on a concrete backend; `sqlite` and `file_tree` are the
//! backends shipped with this crate.

pub mod file_tree;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::checkpoint::codec::CodecError;
use crate::checkpoint::{corruption, migration, Checkpoint, CheckpointError, CorruptionReport};
use crate::telemetry::TelemetryEvent;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("checkpoint {0} not found")]
    CheckpointNotFound(String),
    #[error("storage backend not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("checkpoint {checkpoint_id} is corrupted: {report:?}")]
    Corrupted {
        checkpoint_id: String,
        report: CorruptionReport,
    },
    #[error("checkpoint migration failed: {0}")]
    Migration(#[from] CheckpointError),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait EventStorage: Send + Sync {
    async fn store_event(&self, event: &TelemetryEvent) -> StorageResult<()>;
    async fn store_events_batch(&self, events: &[TelemetryEvent]) -> StorageResult<()>;
    async fn load_events(
        &self,
        selector_name: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<TelemetryEvent>>;
}

#[async_trait]
pub trait CheckpointStorage: Send + Sync {
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()>;
    async fn load_checkpoint(&self, checkpoint_id: &str) -> StorageResult<Option<Checkpoint>>;
    async fn delete_checkpoint(&self, checkpoint_id: &str) -> StorageResult<()>;
    async fn list_checkpoints(
        &self,
        job_id: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Checkpoint>>;
}

/// Encodes a checkpoint through the checksum/compress/encrypt envelope
/// pipeline and serializes the envelope for the backend to persist.
/// Both `CheckpointStorage` implementations write through this rather
/// than serializing `Checkpoint` directly, so every stored checkpoint is
/// checksum-verifiable on the way back in.
pub(crate) fn encode_for_storage(checkpoint: &Checkpoint) -> StorageResult<Vec<u8>> {
    let envelope = crate::checkpoint::codec::encode(
        checkpoint,
        checkpoint.compression != crate::checkpoint::CompressionKind::None,
        None,
    )?;
    Ok(serde_json::to_vec(&envelope)?)
}

/// Reverses `encode_for_storage`: decodes the envelope, runs corruption
/// detection against the real decode outcome, and migrates the result to
/// the current schema before handing it back. `checkpoint_id` is only
/// used to label a report when decoding fails before a checkpoint_id can
/// be read back out of the payload.
pub(crate) fn decode_from_storage(
    checkpoint_id: &str,
    envelope_bytes: &[u8],
) -> StorageResult<Checkpoint> {
    let envelope: crate::checkpoint::codec::CheckpointEnvelope =
        serde_json::from_slice(envelope_bytes)?;

    let mut checkpoint = match crate::checkpoint::codec::decode(&envelope, None) {
        Ok(checkpoint) => checkpoint,
        Err(error) => {
            let report = corruption::from_decode_error(checkpoint_id, &error);
            return Err(StorageError::Corrupted {
                checkpoint_id: checkpoint_id.to_string(),
                report,
            });
        }
    };

    if let Some(report) = corruption::detect(
        &checkpoint.checkpoint_id,
        Ok(&checkpoint),
        None,
        checkpoint.size_bytes as usize,
    ) {
        return Err(StorageError::Corrupted {
            checkpoint_id: checkpoint.checkpoint_id.clone(),
            report,
        });
    }

    migration::migrate(&mut checkpoint)?;
    Ok(checkpoint)
}
