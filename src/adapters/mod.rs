//! Adapter interfaces for external systems.
//!
//! The pipeline talks to two boundaries: a speech synthesis service that
//! turns text into audio bytes, and a merging facility that joins ordered
//! clips into one file. Both are traits so the orchestrator never depends
//! on a particular mechanism.

pub mod byte_concat;
pub mod ffmpeg;
pub mod google_tts;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{MergeError, SynthesisError};

pub use byte_concat::ByteConcatMerger;
pub use ffmpeg::FfmpegMerger;
pub use google_tts::GoogleTranslateTts;

/// Text-to-speech boundary
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Human-readable synthesizer name
    fn name(&self) -> &str;

    /// Synthesize one piece of text into raw audio bytes
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError>;
}

/// Inputs of a single merge
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Clip files, already in playback order
    pub inputs: Vec<PathBuf>,

    /// Where a listing file may be written (if the merger needs one)
    pub manifest_path: PathBuf,

    /// Where the merged audio must be written
    pub output_path: PathBuf,
}

/// Stream-merging boundary
#[async_trait]
pub trait AudioMerger: Send + Sync {
    /// Human-readable merger name
    fn name(&self) -> &str;

    /// Join the inputs in order, without re-encoding
    async fn merge(&self, request: &MergeRequest) -> Result<PathBuf, MergeError>;

    /// Check that the merger can run
    async fn health_check(&self) -> Result<(), MergeError>;
}
