//! Audio concatenation: validate clip order, merge, publish.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{AudioMerger, MergeRequest};
use crate::core::workspace::RunWorkspace;
use crate::domain::{AudioArtifact, AudioClip};
use crate::error::{MergeError, PipelineError};

/// Joins ordered clips into one artifact through an [`AudioMerger`]
#[derive(Clone)]
pub struct Concatenator {
    merger: Arc<dyn AudioMerger>,
}

impl Concatenator {
    pub fn new(merger: Arc<dyn AudioMerger>) -> Self {
        Self { merger }
    }

    pub fn merger_name(&self) -> &str {
        self.merger.name()
    }

    /// Merge `clips` and move the result to `destination`.
    ///
    /// The merge writes inside the workspace first, so a failed or
    /// cancelled merge never leaves a partial file at the destination.
    /// Publishing problems are merge failures as well.
    #[instrument(skip(self, clips, workspace), fields(run_id = %workspace.run_id(), clips = clips.len()))]
    pub async fn concatenate(
        &self,
        clips: &[AudioClip],
        workspace: &RunWorkspace,
        destination: &Path,
    ) -> Result<AudioArtifact, PipelineError> {
        validate_sequence(clips)?;

        let request = MergeRequest {
            inputs: clips.iter().map(|c| c.path.clone()).collect(),
            manifest_path: workspace.manifest_path(),
            output_path: workspace.merged_path(),
        };

        let merged = self
            .merger
            .merge(&request)
            .await
            .map_err(|cause| PipelineError::MergeFailed { cause })?;

        let size_bytes = publish(&merged, destination)
            .await
            .map_err(|e| PipelineError::MergeFailed {
                cause: MergeError::Io(e),
            })?;

        info!(
            merger = self.merger.name(),
            path = %destination.display(),
            size_bytes,
            "Artifact published"
        );

        Ok(AudioArtifact::new(
            workspace.run_id(),
            destination.to_path_buf(),
            size_bytes,
            clips.len(),
        ))
    }
}

/// Clips must be non-empty and indexed exactly `0..N` in order
pub fn validate_sequence(clips: &[AudioClip]) -> Result<(), PipelineError> {
    if clips.is_empty() {
        return Err(PipelineError::InvalidClipSequence(
            "no clips to concatenate".to_string(),
        ));
    }

    for (position, clip) in clips.iter().enumerate() {
        if clip.chunk_index != position {
            return Err(PipelineError::InvalidClipSequence(format!(
                "expected chunk {} at position {}, found chunk {}",
                position, position, clip.chunk_index
            )));
        }
    }

    Ok(())
}

/// Move a file to its final location, copying across filesystems.
///
/// The destination appears in one step (rename or persist) and nothing is
/// awaited afterwards, so a dropped future never leaves a file behind.
pub async fn publish(from: &Path, to: &Path) -> io::Result<u64> {
    let parent = match to.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).await?;
    let size_bytes = fs::metadata(from).await?.len();

    // Inline so the move cannot complete after the caller has given up
    match std::fs::rename(from, to) {
        Ok(()) => return Ok(size_bytes),
        // The source stays tracked by the workspace and goes away at cleanup
        Err(e) => warn!(error = %e, "Rename failed, copying artifact instead"),
    }

    let source = from.to_path_buf();
    let staged = tokio::task::spawn_blocking(move || stage_copy(&source, &parent))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

    staged.persist(to).map_err(|e| e.error)?;
    debug!(path = %to.display(), "Artifact copied into place");
    Ok(size_bytes)
}

/// Copy `from` into a hidden temp file inside `dir`.
///
/// The temp file is removed when dropped, so a failed copy or an abandoned
/// result leaves nothing in `dir`.
fn stage_copy(from: &Path, dir: &Path) -> io::Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix(".publish-")
        .tempfile_in(dir)?;
    let mut input = std::fs::File::open(from)?;
    io::copy(&mut input, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ByteConcatMerger;
    use crate::error::ErrorKind;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn clip(index: usize) -> AudioClip {
        AudioClip::new(index, PathBuf::from(format!("{}.mp3", index)), 1)
    }

    #[test]
    fn test_validate_sequence() {
        assert!(validate_sequence(&[clip(0), clip(1), clip(2)]).is_ok());

        for bad in [vec![], vec![clip(1)], vec![clip(0), clip(2)], vec![clip(1), clip(0)], vec![clip(0), clip(0)]] {
            let err = validate_sequence(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidClipSequence);
        }
    }

    #[tokio::test]
    async fn test_concatenate_publishes_artifact() {
        let temp = TempDir::new().unwrap();
        let run_id = Uuid::new_v4();
        let ws = RunWorkspace::create(&temp.path().join("work"), run_id, "mp3").unwrap();

        let mut clips = Vec::new();
        for (i, body) in ["one-", "two-", "three"].iter().enumerate() {
            let path = ws.clip_path(i);
            std::fs::write(&path, body).unwrap();
            clips.push(AudioClip::new(i, path, body.len() as u64));
        }

        let destination = temp.path().join("out").join("podcast.mp3");
        let artifact = Concatenator::new(Arc::new(ByteConcatMerger::new()))
            .concatenate(&clips, &ws, &destination)
            .await
            .unwrap();

        assert_eq!(artifact.run_id, run_id);
        assert_eq!(artifact.path, destination);
        assert_eq!(artifact.clip_count, 3);
        assert_eq!(artifact.size_bytes, 13);
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "one-two-three");
        assert!(!ws.merged_path().exists());
    }

    #[tokio::test]
    async fn test_out_of_order_clips_are_rejected_before_merge() {
        let temp = TempDir::new().unwrap();
        let ws = RunWorkspace::create(temp.path(), Uuid::new_v4(), "mp3").unwrap();
        let destination = temp.path().join("podcast.mp3");

        let err = Concatenator::new(Arc::new(ByteConcatMerger::new()))
            .concatenate(&[clip(1), clip(0)], &ws, &destination)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidClipSequence(_)));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_merge_failure() {
        let temp = TempDir::new().unwrap();
        let ws = RunWorkspace::create(&temp.path().join("work"), Uuid::new_v4(), "mp3").unwrap();
        let path = ws.clip_path(0);
        std::fs::write(&path, b"audio").unwrap();

        // Parent of the output directory is a regular file
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let destination = blocker.join("out").join("podcast.mp3");

        let err = Concatenator::new(Arc::new(ByteConcatMerger::new()))
            .concatenate(&[AudioClip::new(0, path, 5)], &ws, &destination)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MergeFailed);
        assert!(matches!(
            err,
            PipelineError::MergeFailed {
                cause: MergeError::Io(_)
            }
        ));
    }

    #[test]
    fn test_stage_copy_lands_in_target_dir() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("merged.mp3");
        std::fs::write(&source, b"merged audio").unwrap();
        let out = temp.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let staged = stage_copy(&source, &out).unwrap();
        assert_eq!(staged.path().parent(), Some(out.as_path()));

        let destination = out.join("podcast.mp3");
        staged.persist(&destination).unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"merged audio");
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_stage_copy_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        std::fs::create_dir(&out).unwrap();

        assert!(stage_copy(&temp.path().join("missing.mp3"), &out).is_err());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_stage_copy_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("merged.mp3");
        std::fs::write(&source, vec![7u8; 64 * 1024]).unwrap();
        let out = temp.path().join("out");
        std::fs::create_dir(&out).unwrap();

        // Result dropped without persisting, as when the run is cancelled
        let staged = {
            let out = out.clone();
            tokio::task::spawn_blocking(move || stage_copy(&source, &out))
        };
        drop(staged.await.unwrap().unwrap());

        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }
}
