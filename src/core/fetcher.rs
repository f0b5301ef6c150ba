//! Speech fetching: one chunk in, one stored clip out.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::adapters::SpeechSynthesizer;
use crate::core::workspace::RunWorkspace;
use crate::domain::{AudioClip, Chunk};
use crate::error::SynthesisError;

/// Turns chunks into clip files inside a run workspace.
///
/// Makes exactly one synthesis call per `fetch`; retrying is up to the
/// caller.
#[derive(Clone)]
pub struct SpeechFetcher {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    language: String,
}

impl SpeechFetcher {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, language: impl Into<String>) -> Self {
        Self {
            synthesizer,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Synthesize a chunk and store the audio under the workspace
    #[instrument(skip(self, chunk, workspace), fields(run_id = %workspace.run_id(), chunk = chunk.index))]
    pub async fn fetch(
        &self,
        chunk: &Chunk,
        workspace: &RunWorkspace,
    ) -> Result<AudioClip, SynthesisError> {
        let audio = self
            .synthesizer
            .synthesize(&chunk.text, &self.language)
            .await?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }

        // Registered before writing so a partial write is still cleaned up
        let path = workspace.clip_path(chunk.index);
        tokio::fs::write(&path, &audio).await?;

        debug!(path = %path.display(), bytes = audio.len(), "Stored clip");
        Ok(AudioClip::new(chunk.index, path, audio.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct Recording {
        calls: Mutex<Vec<(String, String)>>,
        reply: Vec<u8>,
    }

    #[async_trait]
    impl SpeechSynthesizer for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), language.to_string()));
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_fetch_writes_clip() {
        let temp = TempDir::new().unwrap();
        let ws = RunWorkspace::create(temp.path(), Uuid::new_v4(), "mp3").unwrap();
        let synth = Arc::new(Recording {
            calls: Mutex::new(Vec::new()),
            reply: b"ID3audio".to_vec(),
        });
        let fetcher = SpeechFetcher::new(synth.clone(), "en");

        let clip = fetcher.fetch(&Chunk::new(4, "Hello."), &ws).await.unwrap();

        assert_eq!(clip.chunk_index, 4);
        assert_eq!(clip.size_bytes, 8);
        assert_eq!(std::fs::read(&clip.path).unwrap(), b"ID3audio");
        assert!(ws.tracked_paths().contains(&clip.path));
        assert_eq!(
            synth.calls.lock().unwrap().as_slice(),
            &[("Hello.".to_string(), "en".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_audio_is_rejected() {
        let temp = TempDir::new().unwrap();
        let ws = RunWorkspace::create(temp.path(), Uuid::new_v4(), "mp3").unwrap();
        let synth = Arc::new(Recording {
            calls: Mutex::new(Vec::new()),
            reply: Vec::new(),
        });

        let err = SpeechFetcher::new(synth, "en")
            .fetch(&Chunk::new(0, "Hi."), &ws)
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::EmptyResponse));
        assert!(ws.tracked_paths().is_empty());
    }
}
