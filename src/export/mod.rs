//! Artifact export and persistence
//!
//! Fitted transformers and models are wrapped in a versioned JSON
//! envelope and written through an [`ArtifactSink`].

mod artifact;
mod sink;

pub use artifact::{Artifact, ArtifactKind, ARTIFACT_FORMAT_VERSION};
pub use sink::{ArtifactSink, FileArtifactSink};
