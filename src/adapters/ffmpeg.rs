//! Merging through the `ffmpeg` concat demuxer.
//!
//! Writes a listing of `file '<path>'` lines and runs
//! `ffmpeg -y -f concat -safe 0 -i <listing> -c copy <output>`, so streams
//! are copied, never re-encoded.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};

use super::{AudioMerger, MergeRequest};
use crate::error::MergeError;

/// Subprocess merger
pub struct FfmpegMerger {
    /// Path to the ffmpeg binary (default: "ffmpeg")
    binary_path: String,

    /// Upper bound for one merge
    merge_timeout: Duration,
}

impl FfmpegMerger {
    pub fn new(merge_timeout: Duration) -> Self {
        Self::with_binary_path("ffmpeg", merge_timeout)
    }

    /// Create a merger with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>, merge_timeout: Duration) -> Self {
        Self {
            binary_path: binary_path.into(),
            merge_timeout,
        }
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }
}

/// Concat-demuxer listing for the given files
pub fn concat_listing(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", escape_path(p)))
        .collect()
}

/// Quote escaping for single-quoted concat entries: `'` becomes `'\''`
fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

#[async_trait]
impl AudioMerger for FfmpegMerger {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    #[instrument(skip(self, request), fields(inputs = request.inputs.len()))]
    async fn merge(&self, request: &MergeRequest) -> Result<PathBuf, MergeError> {
        if request.inputs.is_empty() {
            return Err(MergeError::NoInputs);
        }

        tokio::fs::write(&request.manifest_path, concat_listing(&request.inputs)).await?;

        let child = Command::new(&self.binary_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(&request.manifest_path)
            .args(["-c", "copy"])
            .arg(&request.output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MergeError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?;

        // kill_on_drop reaps the child when the timeout drops the future
        let output = timeout(self.merge_timeout, child.wait_with_output())
            .await
            .map_err(|_| MergeError::Timeout(self.merge_timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MergeError::ToolFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        let size = tokio::fs::metadata(&request.output_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(MergeError::EmptyOutput(request.output_path.clone()));
        }

        debug!(output = %request.output_path.display(), size, "ffmpeg merge finished");
        Ok(request.output_path.clone())
    }

    async fn health_check(&self) -> Result<(), MergeError> {
        let output = Command::new(&self.binary_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MergeError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MergeError::ToolFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
