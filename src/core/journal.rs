//! Append-only run journal with file-based persistence.
//!
//! Each run writes newline-delimited JSON events to `<runs_dir>/<run_id>.jsonl`.
//! Script text is never stored, only a short hash of it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{RunEvent, RunRecord};

const JOURNAL_EXTENSION: &str = "jsonl";

/// JSONL journal for one run
#[derive(Debug)]
pub struct RunJournal {
    run_id: Uuid,

    /// Path to the `<run_id>.jsonl` file
    path: PathBuf,

    /// Serializes appends from concurrent workers
    write_lock: Mutex<()>,
}

impl RunJournal {
    /// Create or open the journal of a run
    pub async fn open(runs_dir: &Path, run_id: Uuid) -> Result<Self> {
        fs::create_dir_all(runs_dir)
            .await
            .with_context(|| format!("Failed to create runs directory: {}", runs_dir.display()))?;

        Ok(Self {
            run_id,
            path: journal_path(runs_dir, run_id),
            write_lock: Mutex::new(()),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Get the path to the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &RunEvent) -> Result<()> {
        let json = serde_json::to_string(event).context("Failed to serialize event")?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<RunEvent>> {
        replay_file(&self.path).await
    }

    /// Rebuild the record of a single run
    pub async fn load(runs_dir: &Path, run_id: Uuid) -> Result<Option<RunRecord>> {
        let path = journal_path(runs_dir, run_id);
        if !path.exists() {
            return Ok(None);
        }

        let events = replay_file(&path).await?;
        Ok(RunRecord::from_events(&events))
    }

    /// Records of every journaled run, newest first
    pub async fn list_runs(runs_dir: &Path) -> Result<Vec<RunRecord>> {
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(runs_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JOURNAL_EXTENSION) {
                continue;
            }
            let is_run = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| Uuid::parse_str(s).is_ok())
                .unwrap_or(false);
            if !is_run {
                continue;
            }

            let events = replay_file(&path).await?;
            if let Some(record) = RunRecord::from_events(&events) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }
}

fn journal_path(runs_dir: &Path, run_id: Uuid) -> PathBuf {
    runs_dir.join(format!("{}.{}", run_id, JOURNAL_EXTENSION))
}

async fn replay_file(path: &Path) -> Result<Vec<RunEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open journal: {}", path.display()))?;

    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut events = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: RunEvent = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse event in {}", path.display()))?;
        events.push(event);
    }

    Ok(events)
}

/// Hash script content (first 16 hex chars of SHA256)
pub fn hash_script(script: &str) -> String {
    let digest = Sha256::digest(script.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RunEventType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_replay_order() {
        let temp = TempDir::new().unwrap();
        let run_id = Uuid::new_v4();
        let journal = RunJournal::open(temp.path(), run_id).await.unwrap();

        for i in 0..5 {
            let event = RunEvent::new(run_id, RunEventType::ClipSynthesized, format!("clip {}", i))
                .with_chunk(i);
            journal.append(&event).await.unwrap();
        }

        let events = journal.replay().await.unwrap();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.chunk_index, Some(i));
        }
        assert_eq!(
            journal.path().file_name().unwrap().to_str().unwrap(),
            format!("{}.jsonl", run_id)
        );
    }

    #[tokio::test]
    async fn test_replay_missing_journal_is_empty() {
        let temp = TempDir::new().unwrap();
        let journal = RunJournal::open(temp.path(), Uuid::new_v4()).await.unwrap();
        assert!(journal.replay().await.unwrap().is_empty());
        assert!(RunJournal::load(temp.path(), Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_script_hash() {
        let a = hash_script("Bees dance to share directions.");
        let b = hash_script("Bees dance to share directions.");
        let c = hash_script("Something else.");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
