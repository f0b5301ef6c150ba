//! Configuration for podsynth.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PODSYNTH_HOME, PODSYNTH_OUTPUT_DIR,
//!    PODSYNTH_TTS_ENDPOINT, PODSYNTH_LANGUAGE, PODSYNTH_FFMPEG)
//! 2. Config file (.podsynth/config.yaml)
//! 3. Defaults (~/.podsynth)
//!
//! Config file discovery:
//! - Searches current directory and parents for .podsynth/config.yaml
//! - Relative paths in the config file resolve against the project root
//!   (the directory containing .podsynth/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::google_tts::{DEFAULT_CLIENT, DEFAULT_ENDPOINT};
use crate::core::{ChunkerConfig, PipelineSettings, RetryPolicy};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".podsynth";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkerConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// Parent of per-run workspaces
    pub work: Option<String>,
    /// Published artifacts
    pub output: Option<String>,
    /// Run journals
    pub runs: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SynthesisConfig {
    pub endpoint: Option<String>,
    pub language: Option<String>,
    pub client: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub concurrency: Option<usize>,
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeConfig {
    pub backend: Option<MergeBackend>,
    pub ffmpeg_path: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Which merger joins the clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeBackend {
    /// ffmpeg concat demuxer (stream copy)
    #[default]
    Ffmpeg,
    /// In-process byte append (MP3 only)
    Bytes,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub home: PathBuf,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub runs_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub chunking: ChunkerConfig,
    pub synthesis: SynthesisSettings,
    pub merge: MergeSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisSettings {
    pub endpoint: String,
    pub language: String,
    pub client: String,
    pub timeout_seconds: u64,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: "en".to_string(),
            client: DEFAULT_CLIENT.to_string(),
            timeout_seconds: 30,
            concurrency: 1,
            retry: RetryPolicy::default(),
        }
    }
}

impl SynthesisSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeSettings {
    pub backend: MergeBackend,
    pub ffmpeg_path: String,
    pub timeout_seconds: u64,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            backend: MergeBackend::Ffmpeg,
            ffmpeg_path: "ffmpeg".to_string(),
            timeout_seconds: 300,
        }
    }
}

impl MergeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl ResolvedConfig {
    /// Orchestrator settings derived from this configuration
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            chunker: self.chunking.clone(),
            language: self.synthesis.language.clone(),
            concurrency: self.synthesis.concurrency.max(1),
            retry: self.synthesis.retry.clone(),
            work_dir: self.work_dir.clone(),
            output_dir: self.output_dir.clone(),
            audio_extension: "mp3".to_string(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge file, environment and defaults
fn resolve(
    config_file: Option<PathBuf>,
    file: ConfigFile,
    default_home: PathBuf,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Project root is the parent of .podsynth/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let from_file = |value: &Option<String>| value.as_deref().map(|p| resolve_path(&base_dir, p));

    let home = env("PODSYNTH_HOME")
        .map(PathBuf::from)
        .or_else(|| from_file(&file.paths.home))
        .unwrap_or(default_home);

    let work_dir = from_file(&file.paths.work).unwrap_or_else(|| home.join("tmp"));

    let output_dir = env("PODSYNTH_OUTPUT_DIR")
        .map(PathBuf::from)
        .or_else(|| from_file(&file.paths.output))
        .unwrap_or_else(|| home.join("podcasts"));

    let runs_dir = from_file(&file.paths.runs).unwrap_or_else(|| home.join("runs"));

    let defaults = SynthesisSettings::default();
    let synthesis = SynthesisSettings {
        endpoint: env("PODSYNTH_TTS_ENDPOINT")
            .or(file.synthesis.endpoint)
            .unwrap_or(defaults.endpoint),
        language: env("PODSYNTH_LANGUAGE")
            .or(file.synthesis.language)
            .unwrap_or(defaults.language),
        client: file.synthesis.client.unwrap_or(defaults.client),
        timeout_seconds: file
            .synthesis
            .timeout_seconds
            .unwrap_or(defaults.timeout_seconds),
        concurrency: file.synthesis.concurrency.unwrap_or(defaults.concurrency),
        retry: file.synthesis.retry.unwrap_or(defaults.retry),
    };

    let merge_defaults = MergeSettings::default();
    let merge = MergeSettings {
        backend: file.merge.backend.unwrap_or(merge_defaults.backend),
        ffmpeg_path: env("PODSYNTH_FFMPEG")
            .or(file.merge.ffmpeg_path)
            .unwrap_or(merge_defaults.ffmpeg_path),
        timeout_seconds: file
            .merge
            .timeout_seconds
            .unwrap_or(merge_defaults.timeout_seconds),
    };

    ResolvedConfig {
        home,
        work_dir,
        output_dir,
        runs_dir,
        config_file,
        chunking: file.chunking,
        synthesis,
        merge,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    Ok(resolve(config_file, file, default_home, |key| {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let home = PathBuf::from("/home/test/.podsynth");
        let config = resolve(None, ConfigFile::default(), home.clone(), no_env);

        assert_eq!(config.home, home);
        assert_eq!(config.work_dir, home.join("tmp"));
        assert_eq!(config.output_dir, home.join("podcasts"));
        assert_eq!(config.runs_dir, home.join("runs"));
        assert_eq!(
            config.synthesis.endpoint,
            "https://translate.google.com/translate_tts"
        );
        assert_eq!(config.synthesis.language, "en");
        assert_eq!(config.synthesis.client, "tw-ob");
        assert_eq!(config.synthesis.timeout(), Duration::from_secs(30));
        assert_eq!(config.merge.backend, MergeBackend::Ffmpeg);
        assert_eq!(config.merge.timeout(), Duration::from_secs(300));
        assert_eq!(config.chunking.max_chars, 200);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(".podsynth");
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  output: ./public
chunking:
  max_chars: 120
synthesis:
  language: fr
  concurrency: 4
  retry:
    max_attempts: 3
merge:
  backend: bytes
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version.as_deref(), Some("1.0"));
        assert_eq!(parsed.chunking.max_chars, 120);
        assert_eq!(parsed.chunking.min_boundary_offset, 50);
        assert_eq!(parsed.merge.backend, Some(MergeBackend::Bytes));

        let config = resolve(
            Some(config_path),
            parsed,
            PathBuf::from("/unused"),
            no_env,
        );
        assert!(config.output_dir.ends_with("public"));
        assert_eq!(config.synthesis.language, "fr");
        assert_eq!(config.synthesis.retry.max_attempts, 3);

        let settings = config.pipeline_settings();
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.chunker.max_chars, 120);
        assert_eq!(settings.output_dir, config.output_dir);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("PODSYNTH_HOME", "/srv/podsynth"),
            ("PODSYNTH_OUTPUT_DIR", "/srv/public"),
            ("PODSYNTH_TTS_ENDPOINT", "http://localhost:9000/tts"),
            ("PODSYNTH_LANGUAGE", "de"),
            ("PODSYNTH_FFMPEG", "/opt/ffmpeg"),
        ]
        .into_iter()
        .collect();

        let file: ConfigFile = serde_yaml::from_str(
            "synthesis:\n  language: fr\nmerge:\n  ffmpeg_path: /usr/bin/ffmpeg\n",
        )
        .unwrap();

        let config = resolve(None, file, PathBuf::from("/unused"), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.home, PathBuf::from("/srv/podsynth"));
        assert_eq!(config.work_dir, PathBuf::from("/srv/podsynth/tmp"));
        assert_eq!(config.output_dir, PathBuf::from("/srv/public"));
        assert_eq!(config.synthesis.endpoint, "http://localhost:9000/tts");
        assert_eq!(config.synthesis.language, "de");
        assert_eq!(config.merge.ffmpeg_path, "/opt/ffmpeg");
    }

    #[test]
    fn test_zero_concurrency_becomes_sequential() {
        let file: ConfigFile = serde_yaml::from_str("synthesis:\n  concurrency: 0\n").unwrap();
        let config = resolve(None, file, PathBuf::from("/h"), no_env);
        assert_eq!(config.pipeline_settings().concurrency, 1);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
