//! Paragraph-boundary segment splitter.
//!
//! Extractors emit whole pages, sheets, or files. Long segments are split
//! here so each embedded unit stays within a configurable `max_tokens`
//! budget. Splitting occurs on paragraph boundaries (`\n\n`) and falls back
//! to a hard split at the nearest newline or space.
//!
//! # Algorithm
//!
//! 1. Convert `max_tokens` to `max_chars` using a 4 chars/token ratio.
//! 2. Split text on `\n\n` paragraph boundaries.
//! 3. Accumulate paragraphs into a buffer until adding the next paragraph
//!    would exceed `max_chars`, then flush the buffer as a piece.
//! 4. If a single paragraph exceeds `max_chars`, hard-split it at the
//!    nearest newline or space before the limit.
//!
//! Pieces inherit the parent's metadata. When a segment yields more than
//! one piece each gets a `chunk` index; order is preserved throughout.
//!
//! ```rust
//! use docchat_core::chunk::split_segments;
//! use docchat_core::models::TextSegment;
//!
//! let segs = vec![TextSegment::new("Hello world.\n\nSecond paragraph.", "a.txt")];
//! let out = split_segments(segs, 700);
//! assert_eq!(out.len(), 1);
//! ```

use crate::models::{TextSegment, META_CHUNK};

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split every segment into pieces of at most `max_tokens` (approx.).
///
/// `max_tokens == 0` disables splitting. Blank segments are dropped.
pub fn split_segments(segments: Vec<TextSegment>, max_tokens: usize) -> Vec<TextSegment> {
    let mut out = Vec::with_capacity(segments.len());
    for seg in segments {
        if seg.content.trim().is_empty() {
            continue;
        }
        if max_tokens == 0 {
            out.push(seg);
            continue;
        }
        let pieces = split_text(&seg.content, max_tokens * CHARS_PER_TOKEN);
        if pieces.len() == 1 {
            out.push(seg);
            continue;
        }
        for (i, piece) in pieces.into_iter().enumerate() {
            let mut child = TextSegment {
                content: piece,
                metadata: seg.metadata.clone(),
            };
            child.metadata.insert(META_CHUNK.to_string(), i.to_string());
            out.push(child);
        }
    }
    out
}

fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            pieces.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut pieces);
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        pieces.push(current_buf);
    }
    if pieces.is_empty() {
        pieces.push(text.trim().to_string());
    }
    pieces
}

fn hard_split(paragraph: &str, max_chars: usize, pieces: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        let limit = snap_to_char_boundary(remaining, remaining.len().min(max_chars));
        let split_at = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        // Always make progress, even when a single char exceeds the budget.
        let split_at = if split_at == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len())
        } else {
            split_at
        };
        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
