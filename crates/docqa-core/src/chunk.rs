//! Overlapping, boundary-aware text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! where each chunk after the first starts exactly `chunk_overlap`
//! characters before the previous chunk ended. Chunks are produced lazily by
//! the [`Chunks`] iterator.
//!
//! # Algorithm
//!
//! 1. If the rest of the text fits in `chunk_size` characters, emit it and stop.
//! 2. Otherwise look at the window of the next `chunk_size` characters and
//!    cut after the last separator in it, trying in order: paragraph break,
//!    line break, sentence end, space.
//! 3. A separator only counts if the chunk it produces is longer than
//!    `chunk_overlap` characters, so every step makes progress. If none
//!    qualifies, hard-cut at `chunk_size` characters.
//! 4. Start the next chunk `chunk_overlap` characters before the cut.
//!
//! Sizes are counted in characters; offsets are byte offsets, so
//! `&text[chunk.start_offset..chunk.end_offset] == chunk.text` always holds.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::chunk_text;
//!
//! let chunks: Vec<_> = chunk_text("Hello world.\n\nSecond paragraph.", 800, 100).collect();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].index, 0);
//! ```

use serde::Serialize;

/// Split points, most preferred first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", " "];

/// A contiguous, immutable slice of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in the chunk sequence, starting at 0.
    pub index: usize,
    /// The chunk text, an exact substring of the document.
    pub text: String,
    /// Byte offset of the first character in the document.
    pub start_offset: usize,
    /// Byte offset one past the last character in the document.
    pub end_offset: usize,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Lazily split `text` into overlapping chunks.
///
/// `chunk_overlap` must be smaller than `chunk_size`; out-of-range values
/// are clamped (a zero size becomes 1, the overlap becomes at most
/// `chunk_size - 1`). Use
/// [`PipelineConfig::validate`](crate::pipeline::PipelineConfig::validate)
/// to reject them instead.
///
/// # Guarantees
///
/// - Empty text yields no chunks.
/// - Text of at most `chunk_size` characters yields one chunk equal to it.
/// - Every chunk has at most `chunk_size` characters.
/// - Consecutive chunks share exactly `chunk_overlap` characters.
/// - The last chunk ends at the end of the text, so the chunks cover it
///   without gaps.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Chunks<'_> {
    let chunk_size = chunk_size.max(1);
    let chunk_overlap = chunk_overlap.min(chunk_size - 1);

    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());

    Chunks {
        text,
        bounds,
        chunk_size,
        chunk_overlap,
        next_start: Some(0),
        index: 0,
    }
}

/// Iterator over the chunks of one document. Created by [`chunk_text`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of every character, followed by `text.len()`.
    bounds: Vec<usize>,
    chunk_size: usize,
    chunk_overlap: usize,
    /// Character index where the next chunk begins; `None` once exhausted.
    next_start: Option<usize>,
    index: usize,
}

impl Chunks<'_> {
    fn char_count(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Character index to end the chunk starting at `start`, given that the
    /// window `[start, limit)` does not reach the end of the text.
    fn find_cut(&self, start: usize, limit: usize) -> usize {
        let window = &self.text[self.bounds[start]..self.bounds[limit]];
        for sep in SEPARATORS {
            if let Some(pos) = window.rfind(sep) {
                let cut_bytes = pos + sep.len();
                let cut = start + window[..cut_bytes].chars().count();
                if cut - start > self.chunk_overlap {
                    return cut;
                }
            }
        }
        limit
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let start = self.next_start?;
        let total = self.char_count();
        if start >= total {
            self.next_start = None;
            return None;
        }

        let limit = start + self.chunk_size;
        let end = if limit >= total {
            total
        } else {
            self.find_cut(start, limit)
        };

        let (start_offset, end_offset) = (self.bounds[start], self.bounds[end]);
        let chunk = Chunk {
            index: self.index,
            text: self.text[start_offset..end_offset].to_string(),
            start_offset,
            end_offset,
        };

        self.index += 1;
        self.next_start = if end >= total {
            None
        } else {
            Some(end - self.chunk_overlap)
        };

        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
        chunk_text(text, size, overlap).collect()
    }

    /// Drop the first `overlap` characters of every chunk but the first
    /// and concatenate.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_document() -> String {
        (0..40)
            .map(|i| {
                format!(
                    "Paragraph {} talks about topic number {}. It has a second sentence too.",
                    i,
                    i * 7
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(collect("", 800, 100).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = collect("Hello, world!", 800, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 13);
    }

    #[test]
    fn test_text_exactly_chunk_size_is_single_chunk() {
        let text = "a".repeat(50);
        let chunks = collect(&text, 50, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_union_reconstructs_document() {
        let text = sample_document();
        for (size, overlap) in [(800, 100), (120, 20), (64, 0), (33, 32)] {
            let chunks = collect(&text, size, overlap);
            assert!(chunks.len() > 1, "size {} should split", size);
            assert_eq!(reconstruct(&chunks, overlap), text, "size {}", size);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let text = sample_document();
        let overlap = 20;
        let chunks = collect(&text, 120, overlap);
        for pair in chunks.windows(2) {
            let tail: String = {
                let chars: Vec<char> = pair[0].text.chars().collect();
                chars[chars.len() - overlap..].iter().collect()
            };
            let head: String = pair[1].text.chars().take(overlap).collect();
            assert_eq!(tail, head);
            assert!(pair[1].start_offset < pair[0].end_offset);
        }
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let text = sample_document();
        let chunks = collect(&text, 90, 15);
        for c in &chunks {
            assert!(c.char_len() <= 90, "chunk {} has {} chars", c.index, c.char_len());
        }
    }

    #[test]
    fn test_offsets_match_text() {
        let text = sample_document();
        for c in collect(&text, 100, 10) {
            assert_eq!(&text[c.start_offset..c.end_offset], c.text);
        }
    }

    #[test]
    fn test_indices_contiguous() {
        let text = sample_document();
        let chunks = collect(&text, 75, 5);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let text = "Cats are mammals. Dogs are mammals too. The sun is a star.";
        let chunks = collect(text, 30, 5);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Cats are mammals. ");
        assert!(chunks[1].text.ends_with("too. "));
        assert_eq!(chunks[2].text, "too. The sun is a star.");
        assert!(!chunks[0].text.contains("sun"));
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = "First paragraph here.\n\nSecond paragraph. It is longer than the first one.";
        let chunks = collect(text, 40, 4);
        assert_eq!(chunks[0].text, "First paragraph here.\n\n");
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "x".repeat(25);
        let chunks = collect(&text, 10, 3);
        assert_eq!(chunks[0].text.len(), 10);
        assert_eq!(reconstruct(&chunks, 3), text);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = collect(text, 7, 2);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.char_len() <= 7);
        }
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_out_of_range_overlap_is_clamped() {
        let chunks = collect("abcdefghij", 4, 10);
        assert_eq!(reconstruct(&chunks, 3), "abcdefghij");
    }

    #[test]
    fn test_deterministic() {
        let text = sample_document();
        let c1 = collect(&text, 100, 10);
        let c2 = collect(&text, 100, 10);
        assert_eq!(c1, c2);
    }
}
