//! Recursive boundary-preferring text chunker.
//!
//! Splits a rendered [`Document`] (`"Title: …\nContent: …"`) into
//! overlapping [`Chunk`]s of at most `chunk_size` chars, each sharing up
//! to `chunk_overlap` chars with its predecessor.
//!
//! # Algorithm
//!
//! 1. **Split.** Cut the text after every occurrence of the most
//!    preferred separator it contains: paragraph break, line break,
//!    sentence end, word boundary. Separators stay attached to the piece
//!    before them, so pieces tile the text exactly.
//! 2. **Recurse.** Any piece still longer than `chunk_size` is split
//!    again with the next separator kind. A run with no separator at all
//!    is hard-cut every `chunk_size` chars.
//! 3. **Merge.** Adjacent pieces are packed greedily into chunks of up to
//!    `chunk_size` chars. Each new chunk starts by carrying over the
//!    trailing pieces of the previous one that fit in `chunk_overlap`.
//!
//! Overlaps therefore always begin on a piece boundary, and hard-cut runs
//! carry no overlap.
//!
//! Chunks record their char offsets into the rendered text, so the
//! original can be rebuilt exactly by de-overlapping consecutive chunks.
//!
//! # Example
//!
//! ```rust
//! use clarify_harness_core::chunk::{chunk_document, ChunkParams};
//! use clarify_harness_core::models::Document;
//!
//! let doc = Document::new("Checkout", "Users pay by card.");
//! let chunks = chunk_document(&doc, &ChunkParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "Title: Checkout\nContent: Users pay by card.");
//! ```

use crate::models::{Chunk, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separator kinds in preference order. Separators within one tier are
/// equally preferred.
const BOUNDARY_TIERS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Render and split one document. Always returns at least one chunk.
pub fn chunk_document(doc: &Document, params: &ChunkParams) -> Vec<Chunk> {
    let rendered = doc.render();
    let bounds = char_bounds(&rendered);

    split_spans(&rendered, params)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Chunk {
            index,
            title: doc.title.clone(),
            text: rendered[bounds[start]..bounds[end]].to_string(),
            start,
            end,
        })
        .collect()
}

/// Split `text` into `(start, end)` char spans.
///
/// # Guarantees
///
/// - Every span is at most `chunk_size` chars.
/// - Consecutive spans overlap by at most `chunk_overlap` chars and never
///   leave a gap.
/// - The first span starts at 0 and the last ends at the text length.
pub fn split_spans(text: &str, params: &ChunkParams) -> Vec<(usize, usize)> {
    let bounds = char_bounds(text);
    let total = bounds.len() - 1;
    let size = params.chunk_size.max(1);
    let overlap = params.chunk_overlap.min(size - 1);

    if total <= size {
        return vec![(0, total)];
    }

    let mut pieces = Vec::new();
    split_pieces(text, &bounds, 0, total, 0, size, &mut pieces);
    merge_pieces(&pieces, size, overlap)
}

/// Byte offset of every char boundary, including the end of the string.
fn char_bounds(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

fn to_char_index(bounds: &[usize], byte: usize) -> usize {
    bounds.binary_search(&byte).unwrap_or_else(|i| i)
}

/// Tile `[start, end)` with pieces of at most `size` chars, using
/// separator tiers from `tier` onwards.
fn split_pieces(
    text: &str,
    bounds: &[usize],
    start: usize,
    end: usize,
    tier: usize,
    size: usize,
    out: &mut Vec<(usize, usize)>,
) {
    if end - start <= size {
        out.push((start, end));
        return;
    }

    let base = bounds[start];
    let segment = &text[base..bounds[end]];
    for (level, separators) in BOUNDARY_TIERS.iter().enumerate().skip(tier) {
        let mut cuts: Vec<usize> = separators
            .iter()
            .flat_map(|sep| {
                segment
                    .match_indices(sep)
                    .map(move |(pos, m)| to_char_index(bounds, base + pos + m.len()))
            })
            .filter(|&cut| cut < end)
            .collect();
        if cuts.is_empty() {
            continue;
        }
        cuts.sort_unstable();
        cuts.dedup();

        let mut piece_start = start;
        for cut in cuts.into_iter().chain(std::iter::once(end)) {
            if cut > piece_start {
                split_pieces(text, bounds, piece_start, cut, level + 1, size, out);
                piece_start = cut;
            }
        }
        return;
    }

    let mut cut = start;
    while cut < end {
        let next = (cut + size).min(end);
        out.push((cut, next));
        cut = next;
    }
}

/// Pack contiguous pieces greedily into spans of at most `size` chars,
/// carrying trailing pieces of up to `overlap` chars into the next span.
fn merge_pieces(pieces: &[(usize, usize)], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut first = 0;
    while first < pieces.len() {
        let start = pieces[first].0;
        let mut last = first;
        while last + 1 < pieces.len() && pieces[last + 1].1 - start <= size {
            last += 1;
        }
        let end = pieces[last].1;
        spans.push((start, end));
        if last + 1 == pieces.len() {
            break;
        }

        // Earliest carried piece still inside the overlap budget, never the
        // span's own first piece, and leaving room for the next new piece.
        let next_end = pieces[last + 1].1;
        let mut carry = last + 1;
        while carry > first + 1 {
            let candidate = pieces[carry - 1].0;
            if end - candidate > overlap || next_end - candidate > size {
                break;
            }
            carry -= 1;
        }
        first = carry;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut prev_end: usize = 0;
        for c in chunks {
            let skip = prev_end.saturating_sub(c.start);
            out.extend(c.text.chars().skip(skip));
            prev_end = c.end;
        }
        out
    }

    fn long_content() -> String {
        (0..80)
            .map(|i| {
                format!(
                    "Paragraph {} explains the checkout flow. Cards are charged once! Refunds?",
                    i
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_small_document_single_chunk() {
        let doc = Document::new("T", "short body");
        let chunks = chunk_document(&doc, &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].title, "T");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, chunks[0].text.chars().count());
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let doc = Document::new("Runbook", long_content());
        let params = ChunkParams::default();
        let chunks = chunk_document(&doc, &params);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(c.text.chars().count() <= params.chunk_size);
            assert_eq!(c.end - c.start, c.text.chars().count());
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start <= pair[0].end, "gap between chunks");
            assert!(pair[0].end - pair[1].start <= params.chunk_overlap);
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn test_deoverlapped_chunks_rebuild_document() {
        let doc = Document::new("Runbook", long_content());
        let chunks = chunk_document(&doc, &ChunkParams::default());
        assert_eq!(reconstruct(&chunks), doc.render());
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let para = "word ".repeat(30);
        let text = format!("{}\n\n{}\n\n{}", para.trim(), para.trim(), para.trim());
        let spans = split_spans(&text, &ChunkParams { chunk_size: 200, chunk_overlap: 0 });
        let first: String = text.chars().take(spans[0].1).collect();
        assert!(first.ends_with("\n\n"));
    }

    #[test]
    fn test_falls_back_to_hard_cut_without_boundaries() {
        let text = "x".repeat(2500);
        let params = ChunkParams::default();
        let spans = split_spans(&text, &params);
        assert_eq!(spans, vec![(0, 1000), (1000, 2000), (2000, 2500)]);
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let doc = Document::new("Văn Miếu", "Quốc Tử Giám được thành lập. ".repeat(120));
        let chunks = chunk_document(&doc, &ChunkParams::default());
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), doc.render());
    }

    #[test]
    fn test_overlap_starts_on_word_boundary() {
        let text = "alpha beta gamma delta ".repeat(100);
        let params = ChunkParams { chunk_size: 100, chunk_overlap: 30 };
        let spans = split_spans(&text, &params);
        let chars: Vec<char> = text.chars().collect();
        for &(start, _) in spans.iter().skip(1) {
            assert!(chars[start - 1].is_whitespace());
        }
    }

    #[test]
    fn test_single_long_paragraph_keeps_title_with_content() {
        let doc = Document::new(
            "Checkout",
            "The checkout flow charges the card once and records the order. ".repeat(20),
        );
        let params = ChunkParams::default();
        let chunks = chunk_document(&doc, &params);
        assert!(chunks.len() > 1);
        assert!(chunks[0].text.starts_with("Title: Checkout\nContent: The checkout flow"));
        assert!(chunks[0].text.chars().count() > params.chunk_size / 2);
        for c in &chunks {
            assert!(c.text.chars().count() > 100, "undersized chunk {:?}", c.text);
        }
        assert_eq!(reconstruct(&chunks), doc.render());
    }

    #[test]
    fn test_short_leading_paragraph_is_merged_forward() {
        let text = format!("Intro\n\n{}", "word ".repeat(400));
        let params = ChunkParams::default();
        let spans = split_spans(&text, &params);
        assert_eq!(spans[0].0, 0);
        assert!(spans[0].1 > 900, "first span {:?}", spans[0]);
        assert_eq!(spans.last().unwrap().1, text.chars().count());
        for pair in spans.windows(2) {
            assert!(pair[1].0 <= pair[0].1);
            assert!(pair[0].1 - pair[1].0 <= params.chunk_overlap);
        }
    }

    #[test]
    fn test_small_paragraphs_pack_into_one_chunk() {
        let text = vec!["Short paragraph."; 40].join("\n\n");
        let spans = split_spans(&text, &ChunkParams { chunk_size: 300, chunk_overlap: 50 });
        for &(start, end) in &spans[..spans.len() - 1] {
            assert!(end - start > 200, "span ({}, {}) left room unused", start, end);
        }
    }
}

