//! Cancellation Integration Tests
//!
//! Caller-initiated cancellation aborts in-flight synthesis and still
//! releases every temporary resource.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use podsynth::adapters::{AudioMerger, ByteConcatMerger, MergeRequest, SpeechSynthesizer};
use podsynth::core::{cancel_pair, ChunkerConfig, Orchestrator, PipelineSettings};
use podsynth::{MergeError, PipelineError, SynthesisError};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Answers instantly until it sees `hang_on`, then never returns
struct HangingSynth {
    calls: Mutex<Vec<String>>,
    hang_on: &'static str,
}

impl HangingSynth {
    fn new(hang_on: &'static str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            hang_on,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechSynthesizer for HangingSynth {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls.lock().unwrap().push(text.to_string());
        if text.contains(self.hang_on) {
            std::future::pending::<()>().await;
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Writes half an output, signals, then never finishes
struct StalledMerger {
    started: Arc<Notify>,
}

#[async_trait]
impl AudioMerger for StalledMerger {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn merge(&self, request: &MergeRequest) -> Result<PathBuf, MergeError> {
        tokio::fs::write(&request.output_path, b"partial").await?;
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(request.output_path.clone())
    }

    async fn health_check(&self) -> Result<(), MergeError> {
        Ok(())
    }
}

fn script(parts: usize) -> String {
    (0..parts)
        .map(|i| format!("Part {:02} of the episode covers topic {:02} in depth.", i, i))
        .collect::<Vec<_>>()
        .join(" ")
}

fn settings(temp: &TempDir, concurrency: usize) -> PipelineSettings {
    let mut settings = PipelineSettings::new(temp.path().join("work"), temp.path().join("out"));
    settings.chunker = ChunkerConfig {
        max_chars: 60,
        min_boundary_offset: 10,
    };
    settings.concurrency = concurrency;
    settings.retry.max_attempts = 1;
    settings
}

fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default()
}

async fn wait_for_calls(synth: &HangingSynth, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while synth.call_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("synthesizer was never called");
}

#[tokio::test]
async fn test_cancel_during_sequential_synthesis() {
    let temp = TempDir::new().unwrap();
    let synth = HangingSynth::new("Part 02");
    let orch = Arc::new(Orchestrator::new(
        synth.clone(),
        Arc::new(ByteConcatMerger::new()),
        settings(&temp, 1),
    ));

    let (handle, token) = cancel_pair();
    let run = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run_with_cancel(&script(5), token).await })
    };

    // Clips 0 and 1 exist, chunk 2 is in flight
    wait_for_calls(&synth, 3).await;
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run did not stop after cancel")
        .unwrap();

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(synth.call_count(), 3);
    assert!(leftovers(&temp.path().join("work")).is_empty());
    assert!(leftovers(&temp.path().join("out")).is_empty());
}

#[tokio::test]
async fn test_cancel_during_parallel_synthesis() {
    let temp = TempDir::new().unwrap();
    let synth = HangingSynth::new("Part 0");
    let orch = Arc::new(Orchestrator::new(
        synth.clone(),
        Arc::new(ByteConcatMerger::new()),
        settings(&temp, 3),
    ));

    let (handle, token) = cancel_pair();
    let run = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run_with_cancel(&script(8), token).await })
    };

    wait_for_calls(&synth, 3).await;
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run did not stop after cancel")
        .unwrap();

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    // Never more in flight than the pool allows
    assert_eq!(synth.call_count(), 3);
    assert!(leftovers(&temp.path().join("work")).is_empty());
}

#[tokio::test]
async fn test_cancel_during_merge() {
    let temp = TempDir::new().unwrap();
    let synth = HangingSynth::new("never");
    let started = Arc::new(Notify::new());
    let orch = Arc::new(Orchestrator::new(
        synth.clone(),
        Arc::new(StalledMerger {
            started: Arc::clone(&started),
        }),
        settings(&temp, 2),
    ));

    let (handle, token) = cancel_pair();
    let run = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run_with_cancel(&script(4), token).await })
    };

    tokio::time::timeout(Duration::from_secs(5), started.notified())
        .await
        .expect("merge never started");
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run did not stop after cancel")
        .unwrap();

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(synth.call_count(), 4);
    assert!(leftovers(&temp.path().join("work")).is_empty());
    assert!(leftovers(&temp.path().join("out")).is_empty());
}

#[tokio::test]
async fn test_already_cancelled_token_makes_no_calls() {
    let temp = TempDir::new().unwrap();
    let synth = HangingSynth::new("never");
    let orch = Orchestrator::new(
        synth.clone(),
        Arc::new(ByteConcatMerger::new()),
        settings(&temp, 1),
    );

    let (handle, token) = cancel_pair();
    handle.cancel();

    let result = orch.run_with_cancel(&script(3), token).await;

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(synth.call_count(), 0);
    assert!(leftovers(&temp.path().join("work")).is_empty());
}

#[tokio::test]
async fn test_dropped_run_future_still_releases_workspace() {
    let temp = TempDir::new().unwrap();
    let synth = HangingSynth::new("Part 01");
    let orch = Orchestrator::new(
        synth.clone(),
        Arc::new(ByteConcatMerger::new()),
        settings(&temp, 1),
    );

    // Request timeout implemented by dropping the future
    let script = script(3);
    let result = tokio::time::timeout(Duration::from_millis(100), orch.run(&script)).await;

    assert!(result.is_err());
    assert_eq!(synth.call_count(), 2);
    assert!(leftovers(&temp.path().join("work")).is_empty());
}
