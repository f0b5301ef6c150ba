//! Domain types for the synthesis pipeline.
//!
//! - Artifact: chunks, clips and the merged audio
//! - Run: live run state and the record rebuilt from a journal
//! - Events: immutable journal records
//! - Podcast: payloads exchanged with the generation and persistence sides

pub mod artifact;
pub mod events;
pub mod podcast;
pub mod run;

pub use artifact::{AudioArtifact, AudioClip, Chunk};
pub use events::{RunEvent, RunEventType};
pub use podcast::{script_looks_truncated, Outline, PodcastDraft, SynthesisOutcome};
pub use run::{PipelineRun, RunPhase, RunRecord, RunState};
