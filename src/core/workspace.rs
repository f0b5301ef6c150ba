//! Per-run temporary storage.
//!
//! Every run gets its own directory named after its run id, so concurrent
//! runs never share a temporary path. All paths handed out are tracked and
//! released by [`RunWorkspace::cleanup`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CleanupWarning;

const MANIFEST_NAME: &str = "concat_list.txt";

/// Temporary resources owned by one run
#[derive(Debug)]
pub struct RunWorkspace {
    run_id: Uuid,

    /// Directory holding clips, manifest and the merged file
    dir: PathBuf,

    /// File extension used for audio files (without the dot)
    extension: String,

    /// Removes the directory on drop if cleanup never ran
    guard: Mutex<Option<TempDir>>,

    /// Every path handed out so far
    tracked: Mutex<Vec<PathBuf>>,
}

impl RunWorkspace {
    /// Create the run directory under `work_dir`
    pub fn create(work_dir: &Path, run_id: Uuid, extension: &str) -> io::Result<Self> {
        std::fs::create_dir_all(work_dir)?;

        let guard = tempfile::Builder::new()
            .prefix(&format!("run-{}-", run_id))
            .tempdir_in(work_dir)?;
        let dir = guard.path().to_path_buf();

        debug!(run_id = %run_id, dir = %dir.display(), "Created run workspace");

        Ok(Self {
            run_id,
            dir,
            extension: extension.trim_start_matches('.').to_string(),
            guard: Mutex::new(Some(guard)),
            tracked: Mutex::new(Vec::new()),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path for the clip of a chunk (registered before it is written)
    pub fn clip_path(&self, chunk_index: usize) -> PathBuf {
        self.track(format!(
            "{}_chunk_{:05}.{}",
            self.run_id, chunk_index, self.extension
        ))
    }

    /// Path for the merge listing
    pub fn manifest_path(&self) -> PathBuf {
        self.track(MANIFEST_NAME.to_string())
    }

    /// Path the merger writes to before the artifact is published
    pub fn merged_path(&self) -> PathBuf {
        self.track(format!("{}_merged.{}", self.run_id, self.extension))
    }

    /// Paths registered so far and not yet released
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        lock(&self.tracked).clone()
    }

    /// Whether cleanup has already run
    pub fn is_cleaned(&self) -> bool {
        lock(&self.guard).is_none()
    }

    /// Release every temporary resource.
    ///
    /// Best-effort and idempotent: resources that are already gone count as
    /// released, anything else becomes a warning.
    pub fn cleanup(&self) -> Vec<CleanupWarning> {
        let mut warnings = Vec::new();

        let paths = std::mem::take(&mut *lock(&self.tracked));
        for path in paths {
            if let Err(e) = remove_file(&path) {
                warnings.push(CleanupWarning::new(path, e));
            }
        }

        if let Some(guard) = lock(&self.guard).take() {
            if let Err(e) = guard.close() {
                if e.kind() != io::ErrorKind::NotFound {
                    warnings.push(CleanupWarning::new(self.dir.clone(), e));
                }
            }
        }

        for warning in &warnings {
            warn!(run_id = %self.run_id, resource = %warning.resource.display(), cause = %warning.cause, "Cleanup warning");
        }

        warnings
    }

    fn track(&self, name: String) -> PathBuf {
        let path = self.dir.join(name);
        let mut tracked = lock(&self.tracked);
        if !tracked.contains(&path) {
            tracked.push(path.clone());
        }
        path
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
