//! Sentence-aligned word-window chunking

use regex::Regex;
use std::sync::OnceLock;

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Run of text up to and including terminal punctuation, or a trailing fragment
        Regex::new(r"[^.!?]+(?:[.!?]+|$)").expect("sentence pattern is valid")
    })
}

/// Split text into sentences, whitespace-normalized
pub fn split_sentences(text: &str) -> Vec<String> {
    sentence_pattern()
        .find_iter(text)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Chunk text into windows of at most `chunk_size` words
///
/// Whole sentences are packed into a window while they fit. Consecutive
/// windows share the last `overlap` words of the previous one. A sentence
/// longer than a window is split on word boundaries.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size.saturating_sub(1));

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    // Words at the start of `current` carried over from the previous chunk
    let mut carried = 0;

    let mut flush = |current: &mut Vec<String>, carried: &mut usize| {
        if current.len() > *carried {
            chunks.push(current.join(" "));
            let keep = overlap.min(current.len());
            let tail = current.split_off(current.len() - keep);
            *current = tail;
            *carried = current.len();
        }
    };

    for sentence in split_sentences(text) {
        let words: Vec<String> = sentence.split_whitespace().map(str::to_string).collect();

        if current.len() + words.len() > chunk_size {
            flush(&mut current, &mut carried);
        }

        for word in words {
            if current.len() == chunk_size {
                flush(&mut current, &mut carried);
            }
            current.push(word);
        }
    }

    flush(&mut current, &mut carried);
    chunks
}
