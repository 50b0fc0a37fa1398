//! Artifact persistence

use super::artifact::{Artifact, ArtifactKind};
use crate::error::{Result, ScorecastError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Destination for persisted artifacts
pub trait ArtifactSink: Send + Sync {
    /// Write `bytes` to `path`, replacing any previous content
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Read back what was written to `path`
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Remove an artifact written earlier in the same run
    fn discard(&self, path: &Path) -> Result<()>;

    /// Whether something is stored at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Encode and write an artifact
    fn persist<T: Serialize>(&self, artifact: &Artifact<T>, path: &Path) -> Result<()>
    where
        Self: Sized,
    {
        let bytes = artifact.to_json_bytes()?;
        self.write(path, &bytes)?;
        info!(kind = %artifact.kind, path = %path.display(), bytes = bytes.len(), "Persisted artifact");
        Ok(())
    }

    /// Read and decode an artifact of the expected kind
    fn load<T: DeserializeOwned>(&self, path: &Path, kind: ArtifactKind) -> Result<Artifact<T>>
    where
        Self: Sized,
    {
        let bytes = self.read(path)?;
        Artifact::from_json_bytes(&bytes, kind)
    }
}

/// Filesystem sink with atomic replace semantics
#[derive(Debug, Clone, Default)]
pub struct FileArtifactSink;

impl FileArtifactSink {
    pub fn new() -> Self {
        Self
    }

    /// Hidden sibling used as the write target before the rename
    fn temp_path(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        path.with_file_name(format!(".{}.tmp", file_name))
    }

    fn write_temp(tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()
    }
}

impl ArtifactSink for FileArtifactSink {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ScorecastError::PersistenceError(format!(
                    "cannot create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp = Self::temp_path(path);
        let outcome = Self::write_temp(&tmp, bytes).and_then(|_| fs::rename(&tmp, path));

        if let Err(e) = outcome {
            // The destination is untouched; only the temp file may be left over
            let _ = fs::remove_file(&tmp);
            return Err(ScorecastError::PersistenceError(format!(
                "cannot write '{}': {}",
                path.display(),
                e
            )));
        }

        debug!(path = %path.display(), "Wrote artifact file");
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| {
            ScorecastError::PersistenceError(format!("cannot read '{}': {}", path.display(), e))
        })
    }

    fn discard(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Discarded artifact");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScorecastError::PersistenceError(format!(
                "cannot remove '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
