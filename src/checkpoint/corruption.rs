//! Corruption detection (§4.8/§7): checksum → schema-version validity →
//! required fields → field-type consistency → size consistency, in that
//! order, first failure wins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::codec::CodecError;
use super::migration;
use super::Checkpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionType {
    ChecksumMismatch,
    SchemaVersionMismatch,
    InvalidJson,
    InvalidCompression,
    InvalidEncryption,
    MissingFields,
    InvalidDataTypes,
    SizeMismatch,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorruptionReport {
    pub checkpoint_id: String,
    pub corruption_type: CorruptionType,
    pub severity: CorruptionSeverity,
    pub details: HashMap<String, String>,
    pub recovery_possible: bool,
    pub recovery_actions: Vec<String>,
}

fn report(
    checkpoint_id: &str,
    corruption_type: CorruptionType,
    severity: CorruptionSeverity,
    detail_message: impl Into<String>,
    recovery_actions: Vec<String>,
) -> CorruptionReport {
    let mut details = HashMap::new();
    details.insert("message".to_string(), detail_message.into());
    CorruptionReport {
        checkpoint_id: checkpoint_id.to_string(),
        corruption_type,
        severity,
        recovery_possible: !recovery_actions.is_empty(),
        recovery_actions,
        details,
    }
}

/// Maps a failed `codec::decode` outcome onto the corruption kind its
/// underlying `CodecError` actually indicates, rather than folding every
/// decode failure into `ChecksumMismatch`.
pub(crate) fn from_decode_error(checkpoint_id: &str, error: &CodecError) -> CorruptionReport {
    match error {
        CodecError::ChecksumMismatch { .. } | CodecError::DataChecksumMismatch => report(
            checkpoint_id,
            CorruptionType::ChecksumMismatch,
            CorruptionSeverity::High,
            error.to_string(),
            vec!["restore from backup".to_string()],
        ),
        CodecError::Decompression(_) => report(
            checkpoint_id,
            CorruptionType::InvalidCompression,
            CorruptionSeverity::High,
            error.to_string(),
            vec!["restore from backup".to_string()],
        ),
        CodecError::MissingKey => report(
            checkpoint_id,
            CorruptionType::InvalidEncryption,
            CorruptionSeverity::Medium,
            error.to_string(),
            vec!["provide the encryption key and retry".to_string()],
        ),
        CodecError::Serde(_) => report(
            checkpoint_id,
            CorruptionType::InvalidJson,
            CorruptionSeverity::High,
            error.to_string(),
            vec!["restore from backup".to_string()],
        ),
        CodecError::Base64(_) | CodecError::Io(_) => report(
            checkpoint_id,
            CorruptionType::Unknown,
            CorruptionSeverity::High,
            error.to_string(),
            vec![],
        ),
    }
}

/// `decode_outcome` is the direct result of a `codec::decode` call —
/// threading the real error through lets a decode failure be classified
/// by what actually went wrong instead of assumed to be a checksum issue.
pub fn detect(
    checkpoint_id: &str,
    decode_outcome: Result<&Checkpoint, &CodecError>,
    expected_size_bytes: Option<usize>,
    actual_size_bytes: usize,
) -> Option<CorruptionReport> {
    let checkpoint = match decode_outcome {
        Ok(checkpoint) => checkpoint,
        Err(error) => return Some(from_decode_error(checkpoint_id, error)),
    };

    if !migration::is_known_version(&checkpoint.schema_version) {
        let migration_available = checkpoint.schema_version.as_str() < migration::CURRENT_SCHEMA_VERSION;
        return Some(report(
            checkpoint_id,
            CorruptionType::SchemaVersionMismatch,
            if migration_available {
                CorruptionSeverity::Medium
            } else {
                CorruptionSeverity::High
            },
            format!("unrecognized schema_version `{}`", checkpoint.schema_version),
            if migration_available {
                vec!["run schema migration".to_string()]
            } else {
                vec![]
            },
        ));
    }

    if checkpoint.checkpoint_id.is_empty() || checkpoint.job_id.is_empty() {
        return Some(report(
            checkpoint_id,
            CorruptionType::MissingFields,
            CorruptionSeverity::High,
            "missing required field (checkpoint_id/job_id)",
            vec![],
        ));
    }

    if !checkpoint.data.is_object() && !checkpoint.data.is_null() {
        return Some(report(
            checkpoint_id,
            CorruptionType::InvalidDataTypes,
            CorruptionSeverity::High,
            "data field is not an object",
            vec![],
        ));
    }

    if let Some(expected) = expected_size_bytes {
        if expected != actual_size_bytes {
            return Some(report(
                checkpoint_id,
                CorruptionType::SizeMismatch,
                CorruptionSeverity::Low,
                format!("size mismatch: expected {expected} bytes, got {actual_size_bytes}"),
                vec!["re-fetch checkpoint from source".to_string()],
            ));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::super::codec;
    use super::*;
    use serde_json::json;

    #[test]
    fn checksum_mismatch_decode_failure_is_high_severity_and_recoverable() {
        let checkpoint = Checkpoint::new("job-1", json!({"progress": 1}));
        let mut envelope = codec::encode(&checkpoint, false, None).unwrap();
        envelope.checksum = "0".repeat(64);
        let err = codec::decode(&envelope, None).unwrap_err();

        let report = detect("checkpoint-1", Err(&err), None, 0).unwrap();
        assert_eq!(report.severity, CorruptionSeverity::High);
        assert_eq!(report.corruption_type, CorruptionType::ChecksumMismatch);
        assert!(report
            .recovery_actions
            .iter()
            .any(|action| action == "restore from backup"));
    }

    #[test]
    fn malformed_gzip_stream_is_invalid_compression() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        let envelope = codec::CheckpointEnvelope {
            schema_version: migration::CURRENT_SCHEMA_VERSION.to_string(),
            checksum: "0".repeat(64),
            compressed: true,
            encrypted: false,
            payload: STANDARD.encode(b"not actually gzip data"),
        };
        let err = codec::decode(&envelope, None).unwrap_err();

        let report = detect("checkpoint-1", Err(&err), None, 0).unwrap();
        assert_eq!(report.corruption_type, CorruptionType::InvalidCompression);
    }

    #[test]
    fn missing_key_on_encrypted_envelope_is_invalid_encryption() {
        let checkpoint = Checkpoint::new("job-1", json!({}));
        let envelope = codec::encode(&checkpoint, false, Some(b"secret")).unwrap();
        let err = codec::decode(&envelope, None).unwrap_err();

        let report = detect("checkpoint-1", Err(&err), None, 0).unwrap();
        assert_eq!(report.corruption_type, CorruptionType::InvalidEncryption);
        assert!(report.recovery_possible);
    }

    #[test]
    fn size_mismatch_is_low_severity_and_recoverable() {
        let checkpoint = Checkpoint::new("job-1", json!({}));
        let report = detect(&checkpoint.checkpoint_id, Ok(&checkpoint), Some(100), 50).unwrap();
        assert_eq!(report.severity, CorruptionSeverity::Low);
        assert!(report.recovery_possible);
    }

    #[test]
    fn well_formed_checkpoint_reports_no_corruption() {
        let checkpoint = Checkpoint::new("job-1", json!({}));
        assert!(detect(&checkpoint.checkpoint_id, Ok(&checkpoint), None, 0).is_none());
    }
}
