//! Splitting and merging utilities used by the chunking strategies.
//!
//! Pieces are tracked as [`Span`]s into the source text rather than copied
//! strings, so every chunk is a contiguous slice of the input and its offset
//! is known without searching for it afterwards.

use std::collections::VecDeque;

use super::types::ChunkConfig;

/// Length in characters (Unicode scalar values), not bytes.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// A region of the source text, in both byte and character coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
    pub char_start: usize,
    pub char_end: usize,
}

impl Span {
    pub fn whole(text: &str) -> Self {
        Self {
            start: 0,
            end: text.len(),
            char_start: 0,
            char_end: char_len(text),
        }
    }

    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// Characters covered from the start of `self` to the end of `other`.
    fn chars_through(&self, other: &Span) -> usize {
        other.char_end - self.char_start
    }
}

/// Split `span` on `separator`, dropping empty pieces. The empty separator
/// splits into single characters.
pub(crate) fn split_span(text: &str, span: Span, separator: &str) -> Vec<Span> {
    let slice = span.slice(text);
    if separator.is_empty() {
        return slice
            .char_indices()
            .enumerate()
            .map(|(n, (i, c))| Span {
                start: span.start + i,
                end: span.start + i + c.len_utf8(),
                char_start: span.char_start + n,
                char_end: span.char_start + n + 1,
            })
            .collect();
    }

    let sep_chars = char_len(separator);
    let mut pieces = Vec::new();
    let mut byte = span.start;
    let mut chars = span.char_start;
    for part in slice.split(separator) {
        let part_chars = char_len(part);
        if !part.is_empty() {
            pieces.push(Span {
                start: byte,
                end: byte + part.len(),
                char_start: chars,
                char_end: chars + part_chars,
            });
        }
        byte += part.len() + separator.len();
        chars += part_chars + sep_chars;
    }
    pieces
}

/// Recursively split `span`, trying `separators` in order, and merge the
/// pieces into chunk spans of at most `config.chunk_size` characters.
///
/// A piece that still exceeds the limit after the last separator is emitted
/// as-is; with `""` as the final separator that cannot happen.
pub(crate) fn split_recursive(
    text: &str,
    span: Span,
    separators: &[String],
    config: &ChunkConfig,
) -> Vec<Span> {
    let mut output = Vec::new();
    let slice = span.slice(text);

    // First separator present in the text; "" always matches.
    let (separator, remaining) = match separators
        .iter()
        .position(|s| s.is_empty() || slice.contains(s.as_str()))
    {
        Some(i) => (separators[i].as_str(), &separators[i + 1..]),
        None => ("", &separators[separators.len()..]),
    };

    let mut pending: Vec<Span> = Vec::new();
    for piece in split_span(text, span, separator) {
        if piece.char_len() < config.chunk_size {
            pending.push(piece);
            continue;
        }
        if !pending.is_empty() {
            output.extend(merge_spans(text, std::mem::take(&mut pending), config));
        }
        if remaining.is_empty() {
            output.extend(trim_span(text, piece));
        } else {
            output.extend(split_recursive(text, piece, remaining, config));
        }
    }
    if !pending.is_empty() {
        output.extend(merge_spans(text, pending, config));
    }
    output
}

/// Greedily pack consecutive `pieces` into chunk spans no longer than
/// `chunk_size` characters of source text, keeping up to `chunk_overlap`
/// trailing characters of whole pieces at the start of the next chunk.
pub(crate) fn merge_spans(text: &str, pieces: Vec<Span>, config: &ChunkConfig) -> Vec<Span> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<Span> = VecDeque::new();

    for piece in pieces {
        let fits = |window: &VecDeque<Span>| {
            window
                .front()
                .map_or(true, |first| first.chars_through(&piece) <= config.chunk_size)
        };

        if !fits(&window) {
            push_window(text, &mut chunks, &window);

            // Shrink to the overlap budget, and further if the next piece
            // would not fit alongside what remains.
            while let (Some(first), Some(last)) = (window.front().copied(), window.back().copied()) {
                if first.chars_through(&last) > config.chunk_overlap || !fits(&window) {
                    window.pop_front();
                } else {
                    break;
                }
            }
        }

        window.push_back(piece);
    }

    push_window(text, &mut chunks, &window);
    chunks
}

fn push_window(text: &str, chunks: &mut Vec<Span>, window: &VecDeque<Span>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    let covered = Span {
        start: first.start,
        end: last.end,
        char_start: first.char_start,
        char_end: last.char_end,
    };
    chunks.extend(trim_span(text, covered));
}

/// Narrow `span` to exclude surrounding whitespace; `None` if nothing is left.
pub(crate) fn trim_span(text: &str, span: Span) -> Option<Span> {
    let slice = span.slice(text);
    let body = slice.trim();
    if body.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    let char_start = span.char_start + char_len(&slice[..lead]);
    Some(Span {
        start: span.start + lead,
        end: span.start + lead + body.len(),
        char_start,
        char_end: char_start + char_len(body),
    })
}
