//! Checkpoint wire envelope: canonicalize → JSON → SHA-256 checksum →
//! optional gzip → optional HMAC-keystream "encryption" → envelope.
//! Decoding reverses the pipeline and re-verifies the checksum.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::Checkpoint;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("envelope payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },
    #[error("checkpoint data checksum mismatch: data was altered independently of its checksum field")]
    DataChecksumMismatch,
    #[error("envelope is marked encrypted but no key was provided")]
    MissingKey,
    #[error("gzip decompression failed: {0}")]
    Decompression(std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEnvelope {
    pub schema_version: String,
    pub checksum: String,
    pub compressed: bool,
    pub encrypted: bool,
    pub payload: String,
}

pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn encode(
    checkpoint: &Checkpoint,
    compress: bool,
    encryption_key: Option<&[u8]>,
) -> Result<CheckpointEnvelope, CodecError> {
    let canonical = serde_json::to_vec(checkpoint)?;
    let digest = checksum(&canonical);

    let mut payload = canonical;
    if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload)?;
        payload = encoder.finish()?;
    }
    if let Some(key) = encryption_key {
        payload = keystream_xor(&payload, key);
    }

    Ok(CheckpointEnvelope {
        schema_version: checkpoint.schema_version.clone(),
        checksum: digest,
        compressed: compress,
        encrypted: encryption_key.is_some(),
        payload: STANDARD.encode(payload),
    })
}

pub fn decode(
    envelope: &CheckpointEnvelope,
    encryption_key: Option<&[u8]>,
) -> Result<Checkpoint, CodecError> {
    let mut payload = STANDARD.decode(&envelope.payload)?;

    if envelope.encrypted {
        let key = encryption_key.ok_or(CodecError::MissingKey)?;
        payload = keystream_xor(&payload, key);
    }

    if envelope.compressed {
        let mut decoder = GzDecoder::new(&payload[..]);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(CodecError::Decompression)?;
        payload = decompressed;
    }

    let computed = checksum(&payload);
    if computed != envelope.checksum {
        return Err(CodecError::ChecksumMismatch {
            expected: envelope.checksum.clone(),
            computed,
        });
    }

    let checkpoint: Checkpoint = serde_json::from_slice(&payload)?;
    if !checkpoint.verify_checksum() {
        return Err(CodecError::DataChecksumMismatch);
    }
    Ok(checkpoint)
}

/// XOR against an HMAC-derived keystream. This is a placeholder stand-in
/// for confidentiality, not a vetted AEAD construction; it is symmetric
/// under repeated application, so encode and decode share this function.
fn keystream_xor(data: &[u8], key: &[u8]) -> Vec<u8> {
    let mut keystream = Vec::with_capacity(data.len());
    let mut counter: u64 = 0;
    while keystream.len() < data.len() {
        let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
        mac.update(&counter.to_be_bytes());
        keystream.extend_from_slice(&mac.finalize().into_bytes());
        counter += 1;
    }
    data.iter()
        .zip(keystream.iter())
        .map(|(byte, stream_byte)| byte ^ stream_byte)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_plain_envelope() {
        let checkpoint = Checkpoint::new("job-1", json!({"progress": 3}));
        let envelope = encode(&checkpoint, false, None).unwrap();
        let decoded = decode(&envelope, None).unwrap();
        assert_eq!(decoded.checkpoint_id, checkpoint.checkpoint_id);
    }

    #[test]
    fn round_trips_compressed_encrypted_envelope() {
        let checkpoint = Checkpoint::new("job-1", json!({"progress": 3}));
        let key = b"correct horse battery staple";
        let envelope = encode(&checkpoint, true, Some(key)).unwrap();
        assert!(envelope.compressed);
        assert!(envelope.encrypted);
        let decoded = decode(&envelope, Some(key)).unwrap();
        assert_eq!(decoded.data, checkpoint.data);
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let checkpoint = Checkpoint::new("job-1", json!({"progress": 3}));
        let mut envelope = encode(&checkpoint, false, None).unwrap();
        envelope.checksum = "0".repeat(64);
        let err = decode(&envelope, None).unwrap_err();
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));
    }

    #[test]
    fn missing_key_on_encrypted_envelope_errors() {
        let checkpoint = Checkpoint::new("job-1", json!({}));
        let envelope = encode(&checkpoint, false, Some(b"secret")).unwrap();
        let err = decode(&envelope, None).unwrap_err();
        assert!(matches!(err, CodecError::MissingKey));
    }
}
