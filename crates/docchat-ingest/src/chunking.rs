//! Paragraph- and sentence-aware text chunking.
//!
//! Paragraphs (blank-line separated) are packed greedily up to `max_len`
//! characters; any chunk still too long is re-packed sentence by sentence.
//! A single sentence longer than `max_len` is kept whole. Lengths are
//! counted in characters, not bytes.

use once_cell::sync::Lazy;
use regex::Regex;

pub use docchat_core::config::DEFAULT_MAX_CHUNK_LEN;

/// Chunks shorter than this after trimming are dropped.
pub const MIN_CHUNK_CHARS: usize = 10;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph regex"));

/// A sentence is a run up to and including its terminal punctuation. The
/// second alternative keeps stray punctuation so no text is lost.
static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*|[.!?]+").expect("sentence regex"));

/// A chunk with its position in the split of its source document.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Length of `text` in characters.
    pub char_length: usize,
}

/// Greedy paragraph/sentence chunker.
#[derive(Debug, Clone)]
pub struct SmartChunker {
    pub max_len: usize,
}

impl SmartChunker {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Split `text` into ordered chunks.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let pieces = self.split(text);
        let total_chunks = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| TextChunk {
                char_length: char_len(&text),
                text,
                chunk_index,
                total_chunks,
            })
            .collect()
    }

    fn split(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();

        let raw = if char_len(trimmed) <= self.max_len {
            vec![trimmed.to_string()]
        } else {
            self.pack_paragraphs(trimmed)
                .into_iter()
                .flat_map(|chunk| {
                    if char_len(&chunk) <= self.max_len {
                        vec![chunk]
                    } else {
                        self.pack_sentences(&chunk)
                    }
                })
                .collect()
        };

        raw.into_iter()
            .filter(|c| char_len(c.trim()) >= MIN_CHUNK_CHARS)
            .collect()
    }

    fn pack_paragraphs(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for para in PARAGRAPH_BREAK.split(text) {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }

            if !current.is_empty() && char_len(&current) + 2 + char_len(para) > self.max_len {
                chunks.push(current.trim().to_string());
                current = para.to_string();
            } else {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(para);
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }
        chunks
    }

    fn pack_sentences(&self, chunk: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut sub = String::new();

        for sentence in SENTENCE.find_iter(chunk).map(|m| m.as_str()) {
            if !sub.is_empty() && char_len(&sub) + char_len(sentence) > self.max_len {
                push_trimmed(&mut pieces, &sub);
                sub = sentence.to_string();
            } else {
                sub.push_str(sentence);
            }
        }
        push_trimmed(&mut pieces, &sub);
        pieces
    }
}

impl Default for SmartChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_LEN)
    }
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let t = s.trim();
    if !t.is_empty() {
        out.push(t.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_short_text_is_one_trimmed_chunk() {
        let input = "\n  First paragraph here.\n   \nSecond one, same chunk.  \n";
        let chunks = SmartChunker::default().chunk(input);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, input.trim());
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
    }

    #[test]
    fn test_length_is_counted_in_chars() {
        let input = "ü".repeat(800);
        let chunks = SmartChunker::default().chunk(&input);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_length, 800);
    }

    #[test]
    fn test_paragraphs_packed_greedily() {
        let para = "This is a paragraph of moderate size.";
        let input = vec![para; 6].join("\n\n");
        let chunker = SmartChunker::new(80);
        let chunks = chunker.chunk(&input);

        // 37 + 2 + 37 = 76 fits, a third paragraph does not.
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(chunk.text, format!("{}\n\n{}", para, para));
            assert!(chunk.char_length <= 80);
            assert_eq!(chunk.total_chunks, 3);
        }
        let indexes: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_long_paragraph_split_on_sentences() {
        let input = "One sentence here. Another sentence there! Is this the third? Final words.";
        let chunks = SmartChunker::new(40).chunk(input);

        assert_eq!(
            texts(&chunks),
            vec![
                "One sentence here.",
                "Another sentence there!",
                "Is this the third? Final words."
            ]
        );
        assert!(chunks.iter().all(|c| c.char_length <= 40));
    }

    #[test]
    fn test_trailing_text_without_punctuation_is_kept() {
        let input = "A complete sentence that is long. And a tail without a full stop";
        let chunks = SmartChunker::new(40).chunk(input);
        assert_eq!(
            texts(&chunks),
            vec!["A complete sentence that is long.", "And a tail without a full stop"]
        );
    }

    #[test]
    fn test_oversized_sentence_is_left_whole() {
        let long_sentence = format!("{}.", "word ".repeat(30).trim_end());
        let input = format!("Short intro sentence. {} Short outro sentence.", long_sentence);
        let chunks = SmartChunker::new(50).chunk(&input);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, long_sentence);
        assert!(chunks[1].char_length > 50);
        assert!(chunks[0].char_length <= 50 && chunks[2].char_length <= 50);
    }

    #[test]
    fn test_tiny_chunks_dropped_and_indexes_dense() {
        let input = format!("{}\n\nok\n\n{}", "a".repeat(18), "b".repeat(18));
        let chunks = SmartChunker::new(20).chunk(&input);

        assert_eq!(texts(&chunks), vec!["a".repeat(18), "b".repeat(18)]);
        assert_eq!(chunks[1].chunk_index, 1);
        assert!(chunks.iter().all(|c| c.total_chunks == 2));
    }

    #[test]
    fn test_tiny_input_yields_nothing() {
        assert!(SmartChunker::default().chunk("  hi there ").is_empty());
        assert!(SmartChunker::default().chunk("").is_empty());
    }
}
