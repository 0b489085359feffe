use crate::error::{RagError, RagResult};
use std::collections::VecDeque;

/// Separators tried in order: paragraph, line, word, character.
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits page text into overlapping chunks of bounded length.
///
/// Lengths are counted in `char`s. The splitter picks the first separator
/// present in the text, splits on it (the separator stays attached to the
/// start of the following piece), recurses into pieces that are still too
/// long using the remaining separators, and then greedily merges small
/// pieces back together. When a merged chunk is emitted, pieces are dropped
/// from its front until at most `chunk_overlap` chars remain; those carry
/// over into the next chunk.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> RagResult<Self> {
        if chunk_size == 0 {
            return Err(RagError::config("chunk size must be at least 1"));
        }
        if chunk_overlap > chunk_size {
            return Err(RagError::config(format!(
                "chunk overlap ({chunk_overlap}) is larger than chunk size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Splits one page of text. Blank text yields no chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        let mut chunks = self.split_recursive(text, &separators);
        chunks.retain(|chunk| !chunk.trim().is_empty());
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];

        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join(&window) {
                    merged.push(chunk);
                }

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join(&window) {
            merged.push(chunk);
        }

        merged
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Splits on `separator`, keeping each separator at the start of the piece
/// that follows it. An empty separator splits into single chars.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Longest suffix of `a` that is also a prefix of `b`, in chars.
    fn shared_boundary(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        (1..=a.len().min(b.len()))
            .rev()
            .find(|&k| a[a.len() - k..] == b[..k])
            .unwrap_or(0)
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = Chunker::new(1000, 150).unwrap();
        let chunks = chunker.split_text("  Edge detection.\n\nThe Canny operator.  ");
        assert_eq!(chunks, vec!["Edge detection.\n\nThe Canny operator.".to_string()]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        let chunker = Chunker::new(1000, 150).unwrap();
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text(" \n\n \t\n").is_empty());
    }

    #[test]
    fn word_split_with_overlap() {
        let chunker = Chunker::new(10, 4).unwrap();
        assert_eq!(
            chunker.split_text("abc def ghi jkl"),
            vec!["abc def", "def ghi", "ghi jkl"]
        );
    }

    #[test]
    fn overlap_is_dropped_when_a_word_does_not_fit() {
        let chunker = Chunker::new(7, 3).unwrap();
        assert_eq!(chunker.split_text("abc def ghi jkl"), vec!["abc def", "ghi", "jkl"]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let chunker = Chunker::new(30, 0).unwrap();
        let text = "first paragraph here\n\nsecond paragraph here";
        assert_eq!(
            chunker.split_text(text),
            vec!["first paragraph here", "second paragraph here"]
        );
    }

    #[test]
    fn unbroken_runs_fall_back_to_characters() {
        let chunker = Chunker::new(4, 1).unwrap();
        let chunks = chunker.split_text("abcdefghij");
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks.first().map(String::as_str), Some("abcd"));
        assert_eq!(chunks[1], "defg");
    }

    #[test]
    fn chunks_respect_size_and_overlap_bounds() {
        let text: String = (0..600)
            .map(|i| {
                if i % 37 == 36 {
                    format!("word{i}\n\n")
                } else if i % 11 == 10 {
                    format!("word{i}\n")
                } else {
                    format!("word{i} ")
                }
            })
            .collect();
        let chunker = Chunker::new(120, 30).unwrap();
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() > 10);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.chars().count() <= 120, "oversized chunk: {chunk:?}");
        }
        for pair in chunks.windows(2) {
            assert!(shared_boundary(&pair[0], &pair[1]) <= 30);
        }
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let chunker = Chunker::new(6, 0).unwrap();
        let chunks = chunker.split_text("ééééé ççççç");
        assert_eq!(chunks, vec!["ééééé", "ççççç"]);
    }

    #[test]
    fn splitting_is_deterministic() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = "Gaussian blur smooths the image.\nThen gradients are computed.\n\n\
                    Non-maximum suppression thins edges and hysteresis links them.";
        assert_eq!(chunker.split_text(text), chunker.split_text(text));
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(10, 11).is_err());
    }

    #[test]
    fn separator_stays_with_following_piece() {
        assert_eq!(split_keeping_separator("a b c", " "), vec!["a", " b", " c"]);
        assert_eq!(split_keeping_separator(" a", " "), vec![" a"]);
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }
}
