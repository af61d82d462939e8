//! Schema migration chain for checkpoint payloads: 1.0.0 → 1.1.0 → 1.2.0.

use serde_json::Value;

use super::{Checkpoint, CheckpointError, CheckpointResult};

pub const CURRENT_SCHEMA_VERSION: &str = "1.2.0";

const KNOWN_VERSIONS: &[&str] = &["1.0.0", "1.1.0", "1.2.0"];

pub fn is_known_version(version: &str) -> bool {
    KNOWN_VERSIONS.contains(&version)
}

/// Walks the checkpoint forward one version at a time until it reaches
/// `CURRENT_SCHEMA_VERSION`. An unrecognized starting version has no
/// migration path and is reported as a migration failure rather than
/// silently left on the old schema.
pub fn migrate(checkpoint: &mut Checkpoint) -> CheckpointResult<()> {
    let starting_version = checkpoint.schema_version.clone();
    loop {
        match checkpoint.schema_version.as_str() {
            v if v == CURRENT_SCHEMA_VERSION => {
                if checkpoint.schema_version != starting_version {
                    checkpoint.refresh_fingerprint();
                }
                return Ok(());
            }
            "1.0.0" => migrate_1_0_0_to_1_1_0(checkpoint),
            "1.1.0" => migrate_1_1_0_to_1_2_0(checkpoint),
            other => {
                return Err(CheckpointError::MigrationFailed(format!(
                    "no migration path from schema_version {other}"
                )))
            }
        }
    }
}

fn migrate_1_0_0_to_1_1_0(checkpoint: &mut Checkpoint) {
    if let Value::Object(fields) = &mut checkpoint.data {
        fields.entry("retry_count").or_insert(Value::from(0));
    }
    checkpoint.schema_version = "1.1.0".to_string();
}

fn migrate_1_1_0_to_1_2_0(checkpoint: &mut Checkpoint) {
    if let Value::Object(fields) = &mut checkpoint.data {
        fields.entry("correlation_id").or_insert(Value::Null);
    }
    checkpoint.schema_version = "1.2.0".to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn migrates_from_1_0_0_through_the_full_chain() {
        let mut checkpoint = Checkpoint::new("job-1", json!({}));
        checkpoint.schema_version = "1.0.0".to_string();
        migrate(&mut checkpoint).unwrap();
        assert_eq!(checkpoint.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(checkpoint.data["retry_count"], 0);
        assert!(checkpoint.data["correlation_id"].is_null());
    }

    #[test]
    fn unknown_version_fails_with_no_path() {
        let mut checkpoint = Checkpoint::new("job-1", json!({}));
        checkpoint.schema_version = "0.9.0".to_string();
        let err = migrate(&mut checkpoint).unwrap_err();
        assert!(matches!(err, CheckpointError::MigrationFailed(_)));
    }
}
