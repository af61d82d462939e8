//! SQLite-backed `EventStorage` and `CheckpointStorage`, grounded on the
//! teacher's `plan::store::SqlitePlanStore` (open-per-call connections,
//! `configure_connection` pragmas, blocking work off the async runtime).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::checkpoint::Checkpoint;
use crate::sqlite::configure_connection;
use crate::telemetry::TelemetryEvent;

use super::{decode_from_storage, encode_for_storage, CheckpointStorage, EventStorage, StorageError, StorageResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS telemetry_events (
    event_id TEXT PRIMARY KEY,
    selector_name TEXT NOT NULL,
    correlation_id TEXT NOT NULL,
    operation_type TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_telemetry_events_selector ON telemetry_events(selector_name);

CREATE TABLE IF NOT EXISTS checkpoints (
    checkpoint_id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_checkpoints_job ON checkpoints(job_id);
";

#[derive(Clone)]
pub struct SqliteStorage {
    path: Arc<PathBuf>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let store = Self {
            path: Arc::new(path.as_ref().to_path_buf()),
        };
        let conn = store.connect()?;
        conn.execute_batch(SCHEMA)?;
        Ok(store)
    }

    fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(self.path.as_path())?;
        configure_connection(&conn)?;
        Ok(conn)
    }
}

#[async_trait]
impl EventStorage for SqliteStorage {
    async fn store_event(&self, event: &TelemetryEvent) -> StorageResult<()> {
        self.store_events_batch(std::slice::from_ref(event)).await
    }

    async fn store_events_batch(&self, events: &[TelemetryEvent]) -> StorageResult<()> {
        let path = self.path.clone();
        let events = events.to_vec();
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let conn = Connection::open(path.as_path())?;
            configure_connection(&conn)?;
            for event in &events {
                conn.execute(
                    "INSERT OR REPLACE INTO telemetry_events
                        (event_id, selector_name, correlation_id, operation_type, recorded_at, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        event.event_id,
                        event.selector_name,
                        event.correlation_id,
                        serde_json::to_string(&event.operation_type)?,
                        event.timestamp.to_rfc3339(),
                        serde_json::to_string(event)?,
                    ],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(|err| StorageError::NotConfigured(err.to_string()))?
    }

    async fn load_events(
        &self,
        selector_name: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<TelemetryEvent>> {
        let path = self.path.clone();
        let selector_name = selector_name.map(str::to_string);
        let limit = limit.unwrap_or(1000) as i64;
        tokio::task::spawn_blocking(move || -> StorageResult<Vec<TelemetryEvent>> {
            let conn = Connection::open(path.as_path())?;
            configure_connection(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT payload FROM telemetry_events
                 WHERE (?1 IS NULL OR selector_name = ?1)
                 ORDER BY recorded_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![selector_name, limit], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|payload| serde_json::from_str(&payload).map_err(StorageError::from))
                .collect()
        })
        .await
        .map_err(|err| StorageError::NotConfigured(err.to_string()))?
    }
}

#[async_trait]
impl CheckpointStorage for SqliteStorage {
    async fn store_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let path = self.path.clone();
        let checkpoint = checkpoint.clone();
        let payload = String::from_utf8(encode_for_storage(&checkpoint)?)
            .map_err(|err| StorageError::NotConfigured(err.to_string()))?;
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let conn = Connection::open(path.as_path())?;
            configure_connection(&conn)?;
            conn.execute(
                "INSERT INTO checkpoints (checkpoint_id, job_id, state, updated_at, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(checkpoint_id) DO UPDATE SET
                    job_id = excluded.job_id,
                    state = excluded.state,
                    updated_at = excluded.updated_at,
                    payload = excluded.payload",
                params![
                    checkpoint.checkpoint_id,
                    checkpoint.job_id,
                    checkpoint.state.as_str(),
                    checkpoint.updated_at.to_rfc3339(),
                    payload,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|err| StorageError::NotConfigured(err.to_string()))?
    }

    async fn load_checkpoint(&self, checkpoint_id: &str) -> StorageResult<Option<Checkpoint>> {
        let path = self.path.clone();
        let checkpoint_id = checkpoint_id.to_string();
        let payload: Option<String> = tokio::task::spawn_blocking({
            let checkpoint_id = checkpoint_id.clone();
            move || -> StorageResult<Option<String>> {
                let conn = Connection::open(path.as_path())?;
                configure_connection(&conn)?;
                Ok(conn
                    .query_row(
                        "SELECT payload FROM checkpoints WHERE checkpoint_id = ?1",
                        [checkpoint_id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?)
            }
        })
        .await
        .map_err(|err| StorageError::NotConfigured(err.to_string()))??;

        payload
            .map(|payload| decode_from_storage(&checkpoint_id, payload.as_bytes()))
            .transpose()
    }

    async fn delete_checkpoint(&self, checkpoint_id: &str) -> StorageResult<()> {
        let path = self.path.clone();
        let checkpoint_id = checkpoint_id.to_string();
        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let conn = Connection::open(path.as_path())?;
            configure_connection(&conn)?;
            conn.execute(
                "DELETE FROM checkpoints WHERE checkpoint_id = ?1",
                [checkpoint_id.as_str()],
            )?;
            Ok(())
        })
        .await
        .map_err(|err| StorageError::NotConfigured(err.to_string()))?
    }

    async fn list_checkpoints(
        &self,
        job_id: Option<&str>,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Checkpoint>> {
        let path = self.path.clone();
        let job_id = job_id.map(str::to_string);
        let limit = limit.unwrap_or(100) as i64;
        let rows = tokio::task::spawn_blocking(move || -> StorageResult<Vec<(String, String)>> {
            let conn = Connection::open(path.as_path())?;
            configure_connection(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT checkpoint_id, payload FROM checkpoints
                 WHERE (?1 IS NULL OR job_id = ?1)
                 ORDER BY updated_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![job_id, limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(|err| StorageError::NotConfigured(err.to_string()))??;

        rows.into_iter()
            .map(|(checkpoint_id, payload)| decode_from_storage(&checkpoint_id, payload.as_bytes()))
            .collect()
    }
}
