//! Run state: the live state machine of one invocation and the record
//! reconstructed from its journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::artifact::{AudioClip, Chunk};
use super::events::{RunEvent, RunEventType};

/// Phase of a live pipeline run
///
/// Success path: `Chunking → Synthesizing → Merging → CleaningUp → Done`.
/// Every failure passes through `CleaningUp` before reaching `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum RunPhase {
    Chunking,
    Synthesizing { completed: usize, total: usize },
    Merging,
    CleaningUp,
    Done,
    Failed { reason: String },
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

/// Ephemeral state of one invocation
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Unique identifier, embedded in every temporary path
    pub id: Uuid,

    /// Current phase
    pub phase: RunPhase,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Chunks produced by the chunker
    pub chunks: Vec<Chunk>,

    /// Clips collected so far (arrival order)
    pub clips: Vec<AudioClip>,
}

impl PipelineRun {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            phase: RunPhase::Chunking,
            started_at: Utc::now(),
            chunks: Vec::new(),
            clips: Vec::new(),
        }
    }

    /// Move to the next phase
    pub fn transition(&mut self, next: RunPhase) {
        debug!(run_id = %self.id, from = ?self.phase, to = ?next, "Run phase change");
        self.phase = next;
    }

    /// Store the chunk list and enter the synthesis phase
    pub fn start_synthesis(&mut self, chunks: Vec<Chunk>) {
        let total = chunks.len();
        self.chunks = chunks;
        self.transition(RunPhase::Synthesizing { completed: 0, total });
    }

    /// Record a finished clip (any order)
    pub fn record_clip(&mut self, clip: AudioClip) {
        self.clips.push(clip);
        if let RunPhase::Synthesizing { completed, .. } = &mut self.phase {
            *completed += 1;
        }
    }

    /// Whether every chunk has a clip
    pub fn all_clips_present(&self) -> bool {
        !self.chunks.is_empty() && self.clips.len() == self.chunks.len()
    }

    /// Clips ordered by chunk index, independent of arrival order
    pub fn ordered_clips(&self) -> Vec<AudioClip> {
        let mut clips = self.clips.clone();
        clips.sort_by_key(|c| c.chunk_index);
        clips
    }
}

/// Outcome of a run as seen from its journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    Running,
    Completed,
    Failed { error: String },
    Cancelled,
}

/// Run summary reconstructed by replaying journal events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub chunk_count: usize,
    pub clips_synthesized: usize,
    pub retries: usize,
    pub cleanup_warnings: usize,
    pub audio_ref: Option<String>,
}

impl RunRecord {
    /// Reconstruct a run summary from its events
    pub fn from_events(events: &[RunEvent]) -> Option<Self> {
        let first = events.first()?;

        let mut record = Self {
            run_id: first.run_id,
            state: RunState::Running,
            started_at: first.timestamp,
            finished_at: None,
            chunk_count: 0,
            clips_synthesized: 0,
            retries: 0,
            cleanup_warnings: 0,
            audio_ref: None,
        };

        for event in events {
            record.apply_event(event);
        }

        Some(record)
    }

    /// Apply a single event
    pub fn apply_event(&mut self, event: &RunEvent) {
        match event.event_type {
            RunEventType::RunStarted => {
                self.state = RunState::Running;
                self.started_at = event.timestamp;
            }
            RunEventType::ScriptChunked => {
                self.chunk_count = event.chunk_count.unwrap_or(0);
            }
            RunEventType::ClipSynthesized => self.clips_synthesized += 1,
            RunEventType::ClipRetrying => self.retries += 1,
            RunEventType::MergeStarted | RunEventType::MergeCompleted => {}
            RunEventType::CleanupWarning => self.cleanup_warnings += 1,
            RunEventType::RunCompleted => {
                self.state = RunState::Completed;
                self.finished_at = Some(event.timestamp);
                self.audio_ref = Some(event.summary.clone());
            }
            RunEventType::RunFailed => {
                self.state = RunState::Failed {
                    error: event.error.clone().unwrap_or_default(),
                };
                self.finished_at = Some(event.timestamp);
            }
            RunEventType::RunCancelled => {
                self.state = RunState::Cancelled;
                self.finished_at = Some(event.timestamp);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.state, RunState::Running)
    }
}
