//! Script chunking.
//!
//! Splits a script into bounded, ordered chunks that end on sentence
//! boundaries whenever a boundary sits far enough into the window.

use serde::{Deserialize, Serialize};

use crate::domain::Chunk;

/// Characters accepted as a sentence boundary
const SENTENCE_TERMINALS: [char; 3] = ['.', '!', '?'];

/// Chunking parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// A boundary must sit strictly past this character offset in the
    /// window to be used as a cut point
    #[serde(default = "default_min_boundary_offset")]
    pub min_boundary_offset: usize,
}

fn default_max_chars() -> usize {
    200
}

fn default_min_boundary_offset() -> usize {
    50
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            min_boundary_offset: default_min_boundary_offset(),
        }
    }
}

impl ChunkerConfig {
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self {
            max_chars,
            ..Self::default()
        }
    }
}

/// Split a script into ordered chunks.
///
/// Lengths are counted in chars. Empty or whitespace-only scripts yield no
/// chunks. A `max_chars` of zero is treated as one.
pub fn chunk_script(script: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let max_chars = config.max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = script.trim();

    while !rest.is_empty() {
        let cut = cut_point(rest, max_chars, config.min_boundary_offset);
        let text = rest[..cut].trim_end();
        chunks.push(Chunk::new(chunks.len(), text));
        rest = rest[cut..].trim_start();
    }

    if let Some(last) = chunks.last_mut() {
        last.is_final = true;
    }

    chunks
}

/// Byte offset where the next chunk ends
fn cut_point(rest: &str, max_chars: usize, min_boundary_offset: usize) -> usize {
    let window_end = match rest.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => byte_idx,
        // Remainder fits in one chunk
        None => return rest.len(),
    };

    rest[..window_end]
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| SENTENCE_TERMINALS.contains(c))
        .last()
        .filter(|(char_pos, _)| *char_pos > min_boundary_offset)
        .map(|(_, (byte_idx, c))| byte_idx + c.len_utf8())
        .unwrap_or(window_end)
}
