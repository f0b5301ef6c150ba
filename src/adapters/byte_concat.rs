//! In-process merging by appending clip bytes in order.
//!
//! Valid for self-framed formats such as MP3, where a stream-level join is
//! a plain append. Used when ffmpeg is not installed.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::{AudioMerger, MergeRequest};
use crate::error::MergeError;

#[derive(Debug, Default, Clone, Copy)]
pub struct ByteConcatMerger;

impl ByteConcatMerger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioMerger for ByteConcatMerger {
    fn name(&self) -> &str {
        "bytes"
    }

    async fn merge(&self, request: &MergeRequest) -> Result<PathBuf, MergeError> {
        if request.inputs.is_empty() {
            return Err(MergeError::NoInputs);
        }

        let mut output = File::create(&request.output_path).await?;
        let mut written = 0u64;
        for input in &request.inputs {
            let bytes = fs::read(input).await?;
            output.write_all(&bytes).await?;
            written += bytes.len() as u64;
        }
        output.flush().await?;

        if written == 0 {
            return Err(MergeError::EmptyOutput(request.output_path.clone()));
        }

        Ok(request.output_path.clone())
    }

    async fn health_check(&self) -> Result<(), MergeError> {
        Ok(())
    }
}
