//! Chunks, clips and the merged audio artifact.
//!
//! A run turns a script into ordered [`Chunk`]s, each chunk into one
//! temporary [`AudioClip`], and all clips into a single [`AudioArtifact`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded slice of the script, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the script (defines concatenation order)
    pub index: usize,

    /// Trimmed text, never empty
    pub text: String,

    /// Whether this is the last chunk of the script
    pub is_final: bool,
}

impl Chunk {
    /// Create a non-final chunk
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            is_final: false,
        }
    }

    /// Length in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Synthesized audio for one chunk, stored in the run's workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Index of the chunk this clip voices
    pub chunk_index: usize,

    /// Temporary file holding the audio bytes
    pub path: PathBuf,

    /// Size in bytes
    pub size_bytes: u64,
}

impl AudioClip {
    pub fn new(chunk_index: usize, path: PathBuf, size_bytes: u64) -> Self {
        Self {
            chunk_index,
            path,
            size_bytes,
        }
    }
}

/// The merged, playable output of one run
///
/// Ownership passes to the caller; the pipeline never deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// Run that produced this artifact
    pub run_id: Uuid,

    /// Final location of the merged audio
    pub path: PathBuf,

    /// When the artifact was published
    pub created_at: DateTime<Utc>,

    /// Size in bytes
    pub size_bytes: u64,

    /// Number of clips merged into it
    pub clip_count: usize,
}

impl AudioArtifact {
    pub fn new(run_id: Uuid, path: PathBuf, size_bytes: u64, clip_count: usize) -> Self {
        Self {
            run_id,
            path,
            created_at: Utc::now(),
            size_bytes,
            clip_count,
        }
    }

    /// Opaque locator handed to the persistence collaborator
    pub fn audio_ref(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}
