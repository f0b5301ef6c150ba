//! Core pipeline logic.
//!
//! - Chunker: script splitting
//! - SpeechFetcher: chunk to clip
//! - Concatenator: clips to artifact
//! - Orchestrator: the run state machine tying them together
//! - RunWorkspace, RunJournal, RetryPolicy, cancellation: run plumbing

pub mod cancel;
pub mod chunker;
pub mod concat;
pub mod fetcher;
pub mod journal;
pub mod orchestrator;
pub mod retry;
pub mod workspace;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use chunker::{chunk_script, ChunkerConfig};
pub use concat::{validate_sequence, Concatenator};
pub use fetcher::SpeechFetcher;
pub use journal::{hash_script, RunJournal};
pub use orchestrator::{artifact_file_name, Orchestrator, PipelineSettings};
pub use retry::RetryPolicy;
pub use workspace::RunWorkspace;
