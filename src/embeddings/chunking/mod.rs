#[cfg(test)]
mod tests;

use tracing::debug;

/// Configuration for splitting normalized text into chunks.
///
/// Sizes are in characters. Adjacent chunks share `overlap` characters so
/// that retrieval does not lose context at chunk boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap in characters between adjacent chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}

/// Split text into overlapping chunks, preferring natural boundaries.
///
/// The window is cut at the latest paragraph break inside it, falling back
/// to a line break, then a sentence end, then a word boundary, and finally
/// a hard cut at `chunk_size` characters. Empty or whitespace-only input
/// produces no chunks; every returned chunk is non-empty and trimmed.
#[inline]
#[expect(clippy::string_slice, reason = "offsets come from char_indices")]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let total = chars.len();

    let byte_at = |char_idx: usize| -> usize {
        if char_idx >= total {
            text.len()
        } else {
            chars[char_idx].0
        }
    };

    if total <= config.chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let window_end = (start + config.chunk_size).min(total);
        let end = if window_end < total {
            find_break(&chars, start, window_end)
        } else {
            window_end
        };

        let piece = text[byte_at(start)..byte_at(end)].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= total {
            break;
        }

        // Back up by the overlap, but always make forward progress.
        start = end.saturating_sub(config.overlap).max(start + 1);
    }

    debug!(
        "Chunked {} chars into {} chunks (target {}, overlap {})",
        total,
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    chunks
}

/// Find the best split point inside `(start, window_end]`, scanning the
/// second half of the window so chunks never collapse to a few characters.
fn find_break(chars: &[(usize, char)], start: usize, window_end: usize) -> usize {
    let floor = start + (window_end - start) / 2;

    // Paragraph break: cut after "\n\n"
    for i in (floor..window_end.saturating_sub(1)).rev() {
        if chars[i].1 == '\n' && chars[i + 1].1 == '\n' {
            return i + 2;
        }
    }

    // Line break
    for i in (floor..window_end).rev() {
        if chars[i].1 == '\n' {
            return i + 1;
        }
    }

    // Sentence end followed by whitespace
    for i in (floor..window_end.saturating_sub(1)).rev() {
        if matches!(chars[i].1, '.' | '!' | '?') && chars[i + 1].1.is_whitespace() {
            return i + 1;
        }
    }

    // Word boundary
    for i in (floor..window_end).rev() {
        if chars[i].1.is_whitespace() {
            return i + 1;
        }
    }

    // Hard cut
    window_end
}
