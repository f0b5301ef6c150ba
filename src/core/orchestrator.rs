//! Main orchestrator for synthesis runs.
//!
//! Sequences chunking, speech fetching, merging and cleanup, and enforces
//! the all-or-nothing contract: a run either returns a complete artifact or
//! a single error, and its temporaries are released either way.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AudioMerger, SpeechSynthesizer};
use crate::domain::{
    AudioArtifact, AudioClip, Chunk, PipelineRun, RunEvent, RunEventType, RunPhase, RunRecord,
};
use crate::error::PipelineError;

use super::cancel::CancelToken;
use super::chunker::{chunk_script, ChunkerConfig};
use super::concat::Concatenator;
use super::fetcher::SpeechFetcher;
use super::journal::{hash_script, RunJournal};
use super::retry::RetryPolicy;
use super::workspace::RunWorkspace;

/// Settings for every run of an orchestrator
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunker: ChunkerConfig,

    /// Target language passed to the synthesizer
    pub language: String,

    /// Concurrent synthesis calls per run (1 = sequential)
    pub concurrency: usize,

    pub retry: RetryPolicy,

    /// Parent directory for per-run workspaces
    pub work_dir: PathBuf,

    /// Where finished artifacts are published
    pub output_dir: PathBuf,

    /// Extension of clip and artifact files
    pub audio_extension: String,
}

impl PipelineSettings {
    pub fn new(work_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            language: "en".to_string(),
            concurrency: 1,
            retry: RetryPolicy::default(),
            work_dir: work_dir.into(),
            output_dir: output_dir.into(),
            audio_extension: "mp3".to_string(),
        }
    }
}

/// Per-run handles shared with synthesis workers
#[derive(Clone)]
struct RunContext {
    run_id: Uuid,
    journal: Option<Arc<RunJournal>>,
}

impl RunContext {
    /// Journal an event; failures are logged and never affect the run
    async fn record(&self, event: RunEvent) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&event).await {
                warn!(run_id = %self.run_id, error = %e, "Failed to write journal event");
            }
        }
    }
}

/// Script-to-audio pipeline orchestrator
pub struct Orchestrator {
    fetcher: SpeechFetcher,
    concatenator: Concatenator,
    settings: PipelineSettings,

    /// Directory for run journals (journaling is off when unset)
    journal_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        merger: Arc<dyn AudioMerger>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher: SpeechFetcher::new(synthesizer, settings.language.clone()),
            concatenator: Concatenator::new(merger),
            settings,
            journal_dir: None,
        }
    }

    /// Journal every run under `dir`
    pub fn with_journal_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.journal_dir = Some(dir.into());
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Turn a script into one merged audio artifact
    pub async fn run(&self, script: &str) -> Result<AudioArtifact, PipelineError> {
        self.run_with_cancel(script, CancelToken::never()).await
    }

    /// Like [`Orchestrator::run`], aborting in-flight work once `cancel` fires
    #[instrument(skip(self, script, cancel), fields(chars = script.chars().count()))]
    pub async fn run_with_cancel(
        &self,
        script: &str,
        cancel: CancelToken,
    ) -> Result<AudioArtifact, PipelineError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let ctx = self.open_context(run_id).await;
        let mut run = PipelineRun::new(run_id);

        info!(%run_id, "Starting synthesis run");
        ctx.record(RunEvent::new(
            run_id,
            RunEventType::RunStarted,
            format!("Run started for script {}", hash_script(script)),
        ))
        .await;

        let chunks = chunk_script(script, &self.settings.chunker);
        if chunks.is_empty() {
            // Nothing was allocated, cleanup is a no-op
            run.transition(RunPhase::CleaningUp);
            return self.fail(&ctx, &mut run, PipelineError::EmptyScript).await;
        }

        ctx.record(
            RunEvent::new(
                run_id,
                RunEventType::ScriptChunked,
                format!("Script split into {} chunks", chunks.len()),
            )
            .with_chunk_count(chunks.len()),
        )
        .await;

        if cancel.is_cancelled() {
            run.transition(RunPhase::CleaningUp);
            return self.fail(&ctx, &mut run, PipelineError::Cancelled).await;
        }

        let workspace = match RunWorkspace::create(
            &self.settings.work_dir,
            run_id,
            &self.settings.audio_extension,
        ) {
            Ok(ws) => Arc::new(ws),
            Err(e) => {
                run.transition(RunPhase::CleaningUp);
                return self.fail(&ctx, &mut run, e.into()).await;
            }
        };

        let result = self
            .synthesize_and_merge(&ctx, &mut run, chunks, &workspace, &cancel)
            .await;

        run.transition(RunPhase::CleaningUp);
        for warning in workspace.cleanup() {
            ctx.record(
                RunEvent::new(run_id, RunEventType::CleanupWarning, "Temporary resource left behind")
                    .with_error(warning.to_string()),
            )
            .await;
        }

        match result {
            Ok(artifact) => {
                run.transition(RunPhase::Done);
                let duration_ms = started.elapsed().as_millis() as u64;
                ctx.record(
                    RunEvent::new(run_id, RunEventType::RunCompleted, artifact.audio_ref())
                        .with_duration(duration_ms),
                )
                .await;
                info!(
                    %run_id,
                    path = %artifact.path.display(),
                    clips = artifact.clip_count,
                    duration_ms,
                    "Run completed"
                );
                Ok(artifact)
            }
            Err(e) => self.fail(&ctx, &mut run, e).await,
        }
    }

    /// Replay the journal of a run
    pub async fn get_run_status(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let dir = self.journal_dir()?;
        RunJournal::load(dir, run_id).await
    }

    /// Most recent runs first
    pub async fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let dir = self.journal_dir()?;
        let mut records = RunJournal::list_runs(dir).await?;
        records.truncate(limit);
        Ok(records)
    }

    fn journal_dir(&self) -> Result<&Path> {
        self.journal_dir
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Run journaling is not enabled"))
    }

    async fn open_context(&self, run_id: Uuid) -> RunContext {
        let journal = match &self.journal_dir {
            Some(dir) => match RunJournal::open(dir, run_id).await {
                Ok(journal) => Some(Arc::new(journal)),
                Err(e) => {
                    warn!(%run_id, error = %e, "Journal unavailable, continuing without it");
                    None
                }
            },
            None => None,
        };

        RunContext { run_id, journal }
    }

    async fn synthesize_and_merge(
        &self,
        ctx: &RunContext,
        run: &mut PipelineRun,
        chunks: Vec<Chunk>,
        workspace: &Arc<RunWorkspace>,
        cancel: &CancelToken,
    ) -> Result<AudioArtifact, PipelineError> {
        run.start_synthesis(chunks);

        if self.settings.concurrency <= 1 {
            self.synthesize_sequential(ctx, run, workspace, cancel).await?;
        } else {
            self.synthesize_parallel(ctx, run, workspace, cancel).await?;
        }

        if !run.all_clips_present() {
            return Err(PipelineError::InvalidClipSequence(format!(
                "{} of {} clips present",
                run.clips.len(),
                run.chunks.len()
            )));
        }

        run.transition(RunPhase::Merging);
        let clips = run.ordered_clips();
        ctx.record(RunEvent::new(
            run.id,
            RunEventType::MergeStarted,
            format!("Merging {} clips with {}", clips.len(), self.concatenator.merger_name()),
        ))
        .await;

        let merge_started = Instant::now();
        let destination = self
            .settings
            .output_dir
            .join(artifact_file_name(run.id, &self.settings.audio_extension));

        // The destination only appears in the poll that yields the artifact
        let artifact = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = self.concatenator.concatenate(&clips, workspace, &destination) => result?,
        };

        ctx.record(
            RunEvent::new(run.id, RunEventType::MergeCompleted, "Clips merged")
                .with_duration(merge_started.elapsed().as_millis() as u64),
        )
        .await;

        Ok(artifact)
    }

    async fn synthesize_sequential(
        &self,
        ctx: &RunContext,
        run: &mut PipelineRun,
        workspace: &RunWorkspace,
        cancel: &CancelToken,
    ) -> Result<(), PipelineError> {
        let chunks = run.chunks.clone();
        for chunk in &chunks {
            let clip = fetch_with_retry(
                &self.fetcher,
                &self.settings.retry,
                ctx,
                chunk,
                workspace,
                cancel,
            )
            .await?;
            run.record_clip(clip);
        }
        Ok(())
    }

    /// Bounded worker pool; clips arrive in any order and are recorded by index
    async fn synthesize_parallel(
        &self,
        ctx: &RunContext,
        run: &mut PipelineRun,
        workspace: &Arc<RunWorkspace>,
        cancel: &CancelToken,
    ) -> Result<(), PipelineError> {
        // More permits than chunks buys nothing
        let workers = self.settings.concurrency.min(run.chunks.len()).max(1);
        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for chunk in run.chunks.iter().cloned() {
            let fetcher = self.fetcher.clone();
            let retry = self.settings.retry.clone();
            let ctx = ctx.clone();
            let workspace = Arc::clone(workspace);
            let cancel = cancel.clone();
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| PipelineError::Cancelled)?;
                fetch_with_retry(&fetcher, &retry, &ctx, &chunk, &workspace, &cancel).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(clip)) => run.record_clip(clip),
                Ok(Err(e)) => {
                    // First failure aborts the remaining calls
                    tasks.shutdown().await;
                    return Err(e);
                }
                Err(join_error) => {
                    tasks.shutdown().await;
                    if join_error.is_panic() {
                        std::panic::resume_unwind(join_error.into_panic());
                    }
                    return Err(PipelineError::Cancelled);
                }
            }
        }

        Ok(())
    }

    async fn fail(
        &self,
        ctx: &RunContext,
        run: &mut PipelineRun,
        error: PipelineError,
    ) -> Result<AudioArtifact, PipelineError> {
        let reason = error.to_string();
        run.transition(RunPhase::Failed {
            reason: reason.clone(),
        });

        let (event_type, summary) = if matches!(error, PipelineError::Cancelled) {
            warn!(run_id = %run.id, "Run cancelled");
            (RunEventType::RunCancelled, "Run cancelled")
        } else {
            error!(run_id = %run.id, error = %reason, "Run failed");
            (RunEventType::RunFailed, "Run failed")
        };

        ctx.record(RunEvent::new(run.id, event_type, summary).with_error(reason))
            .await;

        Err(error)
    }
}

/// One chunk through the fetcher, retried per policy, abortable
async fn fetch_with_retry(
    fetcher: &SpeechFetcher,
    retry: &RetryPolicy,
    ctx: &RunContext,
    chunk: &Chunk,
    workspace: &RunWorkspace,
    cancel: &CancelToken,
) -> Result<AudioClip, PipelineError> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let call_started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = fetcher.fetch(chunk, workspace) => result,
        };

        let duration_ms = call_started.elapsed().as_millis() as u64;

        match result {
            Ok(clip) => {
                debug!(chunk = chunk.index, attempt, duration_ms, "Clip synthesized");
                ctx.record(
                    RunEvent::new(
                        ctx.run_id,
                        RunEventType::ClipSynthesized,
                        format!("Clip {} ready ({} bytes)", chunk.index, clip.size_bytes),
                    )
                    .with_chunk(chunk.index)
                    .with_duration(duration_ms),
                )
                .await;
                return Ok(clip);
            }
            Err(cause) if retry.should_retry(attempt) => {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    chunk = chunk.index,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %cause,
                    "Synthesis failed, retrying"
                );
                ctx.record(
                    RunEvent::new(
                        ctx.run_id,
                        RunEventType::ClipRetrying,
                        format!("Clip {} attempt {} failed", chunk.index, attempt),
                    )
                    .with_chunk(chunk.index)
                    .with_duration(duration_ms)
                    .with_error(cause.to_string()),
                )
                .await;

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(cause) => {
                error!(chunk = chunk.index, attempt, error = %cause, "Synthesis failed permanently");
                return Err(PipelineError::SynthesisFailed {
                    chunk_index: chunk.index,
                    cause,
                });
            }
        }
    }
}

/// `podcast_<unix-millis>_<run-id-prefix>.<ext>`
pub fn artifact_file_name(run_id: Uuid, extension: &str) -> String {
    let id = run_id.simple().to_string();
    format!(
        "podcast_{}_{}.{}",
        Utc::now().timestamp_millis(),
        &id[..8],
        extension.trim_start_matches('.')
    )
}
