//! Error taxonomy for the synthesis pipeline.
//!
//! Fatal errors abort a run and are returned to the caller as a single
//! [`PipelineError`]. Cleanup problems are never fatal; they surface as
//! [`CleanupWarning`] values that get logged and journaled.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal outcome of a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Script is empty, nothing to synthesize")]
    EmptyScript,

    #[error("Synthesis failed for chunk {chunk_index}: {cause}")]
    SynthesisFailed {
        chunk_index: usize,
        #[source]
        cause: SynthesisError,
    },

    #[error("Merge failed: {cause}")]
    MergeFailed {
        #[source]
        cause: MergeError,
    },

    #[error("Invalid clip sequence: {0}")]
    InvalidClipSequence(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

impl PipelineError {
    /// Serializable classification handed to the persistence collaborator
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyScript => ErrorKind::EmptyScript,
            Self::SynthesisFailed { .. } => ErrorKind::SynthesisFailed,
            Self::MergeFailed { .. } => ErrorKind::MergeFailed,
            Self::InvalidClipSequence(_) => ErrorKind::InvalidClipSequence,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Workspace(_) => ErrorKind::Workspace,
        }
    }
}

/// Coarse error classification (wire-friendly)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyScript,
    SynthesisFailed,
    MergeFailed,
    InvalidClipSequence,
    Cancelled,
    Workspace,
}

/// Failure of a single speech synthesis call
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Voice service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Voice service returned an empty response")]
    EmptyResponse,

    #[error("Failed to store clip: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of the merge boundary
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No clips to merge")]
    NoInputs,

    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Merge timed out after {0:?}")]
    Timeout(Duration),

    #[error("Merge tool exited with code {exit_code}: {stderr}")]
    ToolFailed { exit_code: i32, stderr: String },

    #[error("Merge produced no output at {0}")]
    EmptyOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal problem while releasing a temporary resource
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Failed to remove {}: {cause}", .resource.display())]
pub struct CleanupWarning {
    pub resource: PathBuf,
    pub cause: String,
}

impl CleanupWarning {
    pub fn new(resource: PathBuf, cause: impl ToString) -> Self {
        Self {
            resource,
            cause: cause.to_string(),
        }
    }
}
