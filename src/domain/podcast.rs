//! Collaborator payloads around the pipeline.
//!
//! [`PodcastDraft`] is what the generation side hands over; only its script
//! is synthesized. [`SynthesisOutcome`] is what goes to persistence.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PipelineError};

use super::artifact::AudioArtifact;

const UNTITLED: &str = "Untitled Podcast";
const MISSING_BULLET: &str = "Missing bullet point. Please regenerate.";
const BULLET_COUNT: usize = 3;

/// Generated podcast content handed to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodcastDraft {
    pub title: String,
    pub topic: String,
    pub script: String,
    #[serde(default)]
    pub bullet_points: Vec<String>,
}

/// Result handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SynthesisOutcome {
    pub fn from_result(result: &Result<AudioArtifact, PipelineError>) -> Self {
        match result {
            Ok(artifact) => Self {
                audio_ref: Some(artifact.audio_ref()),
                success: true,
                error: None,
                message: None,
            },
            Err(e) => Self {
                audio_ref: None,
                success: false,
                error: Some(e.kind()),
                message: Some(e.to_string()),
            },
        }
    }
}

/// Title and key points parsed from an editor-style model response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub title: String,
    pub bullet_points: Vec<String>,
}

impl Outline {
    /// Parse a response of the form "title line, then `- ` bullets".
    ///
    /// Always yields exactly three bullet points; missing ones are filled
    /// with a placeholder asking for regeneration.
    pub fn parse(raw: &str) -> Self {
        let lines: Vec<&str> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let title = match lines.first().copied() {
            Some(first) if first.to_lowercase().contains("title here") => {
                lines.get(1).copied().unwrap_or(UNTITLED)
            }
            Some(first) => first,
            None => UNTITLED,
        }
        .to_string();

        let mut bullet_points: Vec<String> = lines
            .iter()
            .skip(1)
            .filter_map(|line| strip_bullet_marker(line))
            .map(|b| b.to_string())
            .take(BULLET_COUNT)
            .collect();

        while bullet_points.len() < BULLET_COUNT {
            bullet_points.push(MISSING_BULLET.to_string());
        }

        Self {
            title,
            bullet_points,
        }
    }
}

/// Strip a leading `-` or `Bullet N:` marker (case-insensitive)
fn strip_bullet_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('-') {
        return Some(rest.trim());
    }

    let prefix = line.get(..6)?;
    if !prefix.eq_ignore_ascii_case("bullet") {
        return None;
    }
    let rest = line[6..].trim_start();
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    rest[digits..].trim_start().strip_prefix(':').map(str::trim)
}

/// Heuristic for a generator that stopped at its token limit
pub fn script_looks_truncated(script: &str) -> bool {
    let trimmed = script.trim();
    trimmed.chars().count() > 50 && !trimmed.ends_with(&['.', '!', '?'][..])
}
