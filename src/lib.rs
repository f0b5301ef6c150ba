//! podsynth - script-to-audio synthesis pipeline for generated podcasts
//!
//! Turns a long script into one playable audio file: the script is split
//! into bounded chunks, each chunk is voiced by a speech service, and the
//! clips are merged in order into a single artifact.
//!
//! # Architecture
//!
//! A run is all-or-nothing:
//! - Any synthesis or merge failure aborts the run with one error
//! - Temporary clips live in a per-run workspace, released on every path
//! - Each run can be journaled as JSONL events for later inspection
//!
//! # Modules
//!
//! - `adapters`: External boundaries (speech synthesis, audio merging)
//! - `core`: Pipeline logic (Chunker, SpeechFetcher, Concatenator, Orchestrator)
//! - `domain`: Data structures (Chunk, AudioClip, AudioArtifact, RunEvent)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Synthesize a script
//! cat script.txt | podsynth synth
//!
//! # Check run status
//! podsynth status <run-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use crate::core::{cancel_pair, CancelHandle, CancelToken, Orchestrator, PipelineSettings};
pub use domain::{AudioArtifact, AudioClip, Chunk, PodcastDraft, SynthesisOutcome};
pub use error::{CleanupWarning, ErrorKind, MergeError, PipelineError, SynthesisError};
