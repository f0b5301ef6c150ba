//! Journal events for pipeline runs.
//!
//! Every notable state change of a run is recorded as an immutable event in
//! an append-only log. Events carry summaries only, never script text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single event in a run journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The run this event belongs to
    pub run_id: Uuid,

    /// Chunk the event refers to (if applicable)
    pub chunk_index: Option<usize>,

    /// Number of chunks the script was split into (ScriptChunked only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,

    /// Type of event
    pub event_type: RunEventType,

    /// Human-readable summary (no script text)
    pub summary: String,

    /// Time taken in milliseconds
    pub duration_ms: Option<u64>,

    /// Error message if something went wrong
    pub error: Option<String>,
}

impl RunEvent {
    /// Create a new event with the current timestamp
    pub fn new(run_id: Uuid, event_type: RunEventType, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            chunk_index: None,
            chunk_count: None,
            event_type,
            summary: summary.into(),
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_chunk(mut self, chunk_index: usize) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }

    pub fn with_chunk_count(mut self, chunk_count: usize) -> Self {
        self.chunk_count = Some(chunk_count);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Types of events recorded during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventType {
    /// A run has started
    RunStarted,

    /// The script was split into chunks
    ScriptChunked,

    /// One chunk was synthesized into a clip
    ClipSynthesized,

    /// A synthesis call failed and will be retried
    ClipRetrying,

    /// Clips are being merged
    MergeStarted,

    /// Merge finished
    MergeCompleted,

    /// A temporary resource could not be removed
    CleanupWarning,

    /// The run produced an artifact
    RunCompleted,

    /// The run failed
    RunFailed,

    /// The run was cancelled by the caller
    RunCancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::new(Uuid::new_v4(), RunEventType::ClipSynthesized, "clip 2 ready")
            .with_chunk(2)
            .with_duration(340);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"clip_synthesized\""));

        let parsed: RunEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, RunEventType::ClipSynthesized);
        assert_eq!(parsed.chunk_index, Some(2));
        assert_eq!(parsed.duration_ms, Some(340));
    }

    #[test]
    fn test_event_with_error() {
        let event = RunEvent::new(Uuid::new_v4(), RunEventType::RunFailed, "run failed")
            .with_error("Voice service returned HTTP 503");

        assert_eq!(event.error.as_deref(), Some("Voice service returned HTTP 503"));
        assert!(event.chunk_index.is_none());
    }

    #[test]
    fn test_chunk_count_is_separate_from_index() {
        let event = RunEvent::new(Uuid::new_v4(), RunEventType::ScriptChunked, "4 chunks")
            .with_chunk_count(4);
        assert_eq!(event.chunk_count, Some(4));
        assert!(event.chunk_index.is_none());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["chunk_count"], 4);

        // Events without a count still parse
        let clip = RunEvent::new(Uuid::new_v4(), RunEventType::ClipSynthesized, "clip").with_chunk(1);
        let line = serde_json::to_string(&clip).unwrap();
        assert!(!line.contains("chunk_count"));
        let parsed: RunEvent = serde_json::from_str(&line).unwrap();
        assert!(parsed.chunk_count.is_none());
    }
}
