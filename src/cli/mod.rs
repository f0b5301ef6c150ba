//! Command-line interface for podsynth.
//!
//! Provides commands for synthesizing a script into a podcast episode,
//! inspecting how a script is chunked, and checking past runs.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::{AudioMerger, ByteConcatMerger, FfmpegMerger, GoogleTranslateTts};
use crate::config::{self, MergeBackend, ResolvedConfig};
use crate::core::{cancel_pair, chunk_script, ChunkerConfig, Orchestrator, RunJournal};
use crate::domain::{script_looks_truncated, Outline, PodcastDraft, RunState, SynthesisOutcome};

/// podsynth - turn podcast scripts into a single audio file
#[derive(Parser, Debug)]
#[command(name = "podsynth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize a script into one merged audio file
    Synth {
        /// Script file (reads from stdin if not provided)
        #[arg(short, long, conflicts_with = "draft")]
        input: Option<PathBuf>,

        /// Podcast draft JSON ({title, topic, script, bulletPoints})
        #[arg(short, long)]
        draft: Option<PathBuf>,

        /// Concurrent synthesis calls
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Cancel the run after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Merge backend
        #[arg(short, long, value_enum)]
        merger: Option<MergeBackend>,

        /// Where to publish the artifact
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Target language for speech
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Show how a script would be chunked
    Chunk {
        /// Script file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Maximum chunk length in characters
        #[arg(long)]
        max_chars: Option<usize>,

        /// Print chunks as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Parse an editor response into a title and three bullet points
    Outline {
        /// Response file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Check the status of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,

    /// Check that the merge backend is usable
    Doctor {
        /// Merge backend to check (defaults to the configured one)
        #[arg(short, long, value_enum)]
        merger: Option<MergeBackend>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Synth {
                input,
                draft,
                concurrency,
                timeout,
                merger,
                output_dir,
                language,
            } => {
                let options = SynthOptions {
                    concurrency,
                    timeout,
                    merger,
                    output_dir,
                    language,
                };
                synthesize(input, draft, options).await
            }
            Commands::Chunk {
                input,
                max_chars,
                json,
            } => show_chunks(input, max_chars, json),
            Commands::Outline { input } => show_outline(input),
            Commands::Status { run_id } => show_status(&run_id).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Config => show_config(),
            Commands::Doctor { merger } => doctor(merger).await,
        }
    }
}

/// Command-line overrides for a synthesis run
#[derive(Debug, Default)]
struct SynthOptions {
    concurrency: Option<usize>,
    timeout: Option<u64>,
    merger: Option<MergeBackend>,
    output_dir: Option<PathBuf>,
    language: Option<String>,
}

/// Synthesize a script and print the outcome as JSON
async fn synthesize(
    input: Option<PathBuf>,
    draft: Option<PathBuf>,
    options: SynthOptions,
) -> Result<()> {
    let cfg = config::config()?;
    let script = match draft {
        Some(path) => read_draft(&path)?.script,
        None => read_text(input)?,
    };

    if script_looks_truncated(&script) {
        warn!("Script does not end with sentence punctuation, it may have been cut off");
    }

    let mut settings = cfg.pipeline_settings();
    if let Some(concurrency) = options.concurrency {
        settings.concurrency = concurrency.max(1);
    }
    if let Some(output_dir) = options.output_dir {
        settings.output_dir = output_dir;
    }
    if let Some(language) = options.language {
        settings.language = language;
    }

    let synthesizer = Arc::new(
        GoogleTranslateTts::with_client(
            reqwest::Client::new(),
            cfg.synthesis.endpoint.clone(),
            cfg.synthesis.timeout(),
        )
        .with_client_id(cfg.synthesis.client.clone()),
    );
    let merger = build_merger(cfg, options.merger.unwrap_or(cfg.merge.backend));

    let orchestrator =
        Orchestrator::new(synthesizer, merger, settings).with_journal_dir(&cfg.runs_dir);

    let (handle, token) = cancel_pair();
    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                handle.cancel();
            }
        })
    };
    let deadline = options.timeout.map(|secs| {
        let handle = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(timeout_secs = secs, "Run timed out, cancelling");
            handle.cancel();
        })
    });

    let result = orchestrator.run_with_cancel(&script, token).await;

    interrupt.abort();
    if let Some(deadline) = deadline {
        deadline.abort();
    }

    let outcome = SynthesisOutcome::from_result(&result);
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
    );

    if let Err(e) = result {
        eprintln!("\n[Run failed: {}]", e);
        std::process::exit(1);
    }

    Ok(())
}

fn build_merger(cfg: &ResolvedConfig, backend: MergeBackend) -> Arc<dyn AudioMerger> {
    match backend {
        MergeBackend::Ffmpeg => Arc::new(FfmpegMerger::with_binary_path(
            cfg.merge.ffmpeg_path.clone(),
            cfg.merge.timeout(),
        )),
        MergeBackend::Bytes => Arc::new(ByteConcatMerger::new()),
    }
}

/// Read a podcast draft from JSON
fn read_draft(path: &Path) -> Result<PodcastDraft> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read draft: {}", path.display()))?;
    let draft: PodcastDraft = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse draft: {}", path.display()))?;

    info!(title = %draft.title, topic = %draft.topic, "Loaded draft");
    Ok(draft)
}

/// Read text from a file, or from stdin when it is piped
fn read_text(input: Option<PathBuf>) -> Result<String> {
    if let Some(path) = input {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }

    if io::stdin().is_terminal() {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

/// Print the chunks a script splits into
fn show_chunks(input: Option<PathBuf>, max_chars: Option<usize>, json: bool) -> Result<()> {
    let script = read_text(input)?;

    let mut chunker = config::config()
        .map(|cfg| cfg.chunking.clone())
        .unwrap_or_else(|_| ChunkerConfig::default());
    if let Some(max_chars) = max_chars {
        chunker.max_chars = max_chars;
    }

    let chunks = chunk_script(&script, &chunker);
    if chunks.is_empty() {
        eprintln!("Script is empty");
        return Ok(());
    }

    for chunk in &chunks {
        if json {
            println!("{}", serde_json::to_string(chunk)?);
        } else {
            println!("[{:>3}] ({:>3} chars) {}", chunk.index, chunk.char_len(), chunk.text);
        }
    }

    eprintln!("\n{} chunks (max {} chars)", chunks.len(), chunker.max_chars);
    Ok(())
}

fn show_outline(input: Option<PathBuf>) -> Result<()> {
    let raw = read_text(input)?;
    let outline = Outline::parse(&raw);
    println!("{}", serde_json::to_string_pretty(&outline)?);
    Ok(())
}

/// Show the status of a run
async fn show_status(run_id_str: &str) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let cfg = config::config()?;
    let record = RunJournal::load(&cfg.runs_dir, run_id)
        .await?
        .with_context(|| format!("No journal found for run {}", run_id))?;

    println!("Run ID:   {}", record.run_id);
    println!("State:    {}", state_label(&record.state));
    println!("Started:  {}", record.started_at);
    if let Some(finished) = record.finished_at {
        println!("Finished: {}", finished);
    }
    println!("Chunks:   {}", record.chunk_count);
    println!("Clips:    {}", record.clips_synthesized);
    println!("Retries:  {}", record.retries);
    if record.cleanup_warnings > 0 {
        println!("Cleanup warnings: {}", record.cleanup_warnings);
    }
    if let Some(audio_ref) = &record.audio_ref {
        println!("Audio:    {}", audio_ref);
    }
    if let RunState::Failed { error } = &record.state {
        println!("Error:    {}", error);
    }

    Ok(())
}

/// List recent runs
async fn list_runs(limit: usize) -> Result<()> {
    let cfg = config::config()?;
    let mut runs = RunJournal::list_runs(&cfg.runs_dir).await?;
    runs.truncate(limit);

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("{:<38} {:<12} {:<8} {:<26}", "RUN ID", "STATE", "CHUNKS", "STARTED");
    println!("{}", "-".repeat(86));

    for run in runs {
        println!(
            "{:<38} {:<12} {:<8} {:<26}",
            run.run_id,
            state_label(&run.state),
            run.chunk_count,
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn state_label(state: &RunState) -> &'static str {
    match state {
        RunState::Running => "running",
        RunState::Completed => "completed",
        RunState::Failed { .. } => "failed",
        RunState::Cancelled => "cancelled",
    }
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("podsynth configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  Work:    {}", cfg.work_dir.display());
    println!("  Output:  {}", cfg.output_dir.display());
    println!("  Runs:    {}", cfg.runs_dir.display());
    println!();
    println!("Chunking:");
    println!("  Max chars:           {}", cfg.chunking.max_chars);
    println!("  Min boundary offset: {}", cfg.chunking.min_boundary_offset);
    println!();
    println!("Synthesis:");
    println!("  Endpoint:    {}", cfg.synthesis.endpoint);
    println!("  Language:    {}", cfg.synthesis.language);
    println!("  Timeout:     {}s", cfg.synthesis.timeout_seconds);
    println!("  Concurrency: {}", cfg.synthesis.concurrency);
    println!("  Attempts:    {}", cfg.synthesis.retry.max_attempts);
    println!();
    println!("Merge:");
    println!("  Backend: {:?}", cfg.merge.backend);
    println!("  ffmpeg:  {}", cfg.merge.ffmpeg_path);
    println!("  Timeout: {}s", cfg.merge.timeout_seconds);

    Ok(())
}

/// Check the merge backend and the writable directories
async fn doctor(backend: Option<MergeBackend>) -> Result<()> {
    let cfg = config::config()?;
    let merger = build_merger(cfg, backend.unwrap_or(cfg.merge.backend));

    let mut healthy = true;
    match merger.health_check().await {
        Ok(()) => println!("[ok]   merger '{}'", merger.name()),
        Err(e) => {
            healthy = false;
            println!("[fail] merger '{}': {}", merger.name(), e);
        }
    }

    for (label, dir) in [
        ("work", &cfg.work_dir),
        ("output", &cfg.output_dir),
        ("runs", &cfg.runs_dir),
    ] {
        match std::fs::create_dir_all(dir) {
            Ok(()) => println!("[ok]   {} dir {}", label, dir.display()),
            Err(e) => {
                healthy = false;
                println!("[fail] {} dir {}: {}", label, dir.display(), e);
            }
        }
    }

    if !healthy {
        std::process::exit(1);
    }

    Ok(())
}
