//! Versioned JSON artifact envelope

use crate::error::{Result, ScorecastError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Envelope format understood by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Transformer,
    Model,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Transformer => f.write_str("transformer"),
            ArtifactKind::Model => f.write_str("model"),
        }
    }
}

/// A persisted fitted object with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub format_version: u32,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub payload: T,
}

impl<T> Artifact<T> {
    pub fn new(kind: ArtifactKind, payload: T) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            kind,
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
            payload,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T: Serialize> Artifact<T> {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| {
            ScorecastError::SerializationError(format!("failed to encode {} artifact: {}", self.kind, e))
        })
    }
}

impl<T: DeserializeOwned> Artifact<T> {
    /// Decode and check the envelope matches `expected` and this build's format
    pub fn from_json_bytes(bytes: &[u8], expected: ArtifactKind) -> Result<Self> {
        // Read the envelope header first so a kind mismatch is reported as such
        // rather than as a payload decode error
        #[derive(Deserialize)]
        struct Header {
            format_version: u32,
            kind: ArtifactKind,
        }

        let header: Header = serde_json::from_slice(bytes).map_err(|e| {
            ScorecastError::PersistenceError(format!("not a scorecast artifact: {}", e))
        })?;

        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ScorecastError::PersistenceError(format!(
                "unsupported artifact format version {} (expected {})",
                header.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if header.kind != expected {
            return Err(ScorecastError::PersistenceError(format!(
                "expected a {} artifact, found a {} artifact",
                expected, header.kind
            )));
        }

        serde_json::from_slice(bytes).map_err(|e| {
            ScorecastError::SerializationError(format!("failed to decode {} artifact: {}", expected, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let artifact = Artifact::new(ArtifactKind::Model, vec![1.0, 2.0]).with_metadata("r2", 0.87);
        let bytes = artifact.to_json_bytes().unwrap();

        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"kind\": \"model\""));
        assert!(text.contains("\"format_version\": 1"));

        let restored: Artifact<Vec<f64>> = Artifact::from_json_bytes(&bytes, ArtifactKind::Model).unwrap();
        assert_eq!(restored.payload, vec![1.0, 2.0]);
        assert_eq!(restored.metadata.get("r2").map(String::as_str), Some("0.87"));
        assert_eq!(restored.created_at, artifact.created_at);
    }

    #[test]
    fn test_kind_mismatch() {
        let bytes = Artifact::new(ArtifactKind::Transformer, 1u8).to_json_bytes().unwrap();
        let err = Artifact::<u8>::from_json_bytes(&bytes, ArtifactKind::Model).unwrap_err();
        assert!(matches!(err, ScorecastError::PersistenceError(_)));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut artifact = Artifact::new(ArtifactKind::Model, 1u8);
        artifact.format_version = 99;
        let bytes = artifact.to_json_bytes().unwrap();
        assert!(Artifact::<u8>::from_json_bytes(&bytes, ArtifactKind::Model).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let err = Artifact::<u8>::from_json_bytes(b"not json", ArtifactKind::Model).unwrap_err();
        assert!(matches!(err, ScorecastError::PersistenceError(_)));
    }
}
