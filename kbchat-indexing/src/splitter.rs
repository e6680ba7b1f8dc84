//! Recursive character splitting
//!
//! Text is cut on the coarsest separator that occurs in it (paragraphs, then lines, then
//! words, then characters). Pieces are merged back into chunks of at most `chunk_size`
//! characters, and consecutive chunks share up to `chunk_overlap` characters.

use kbchat_core::{config_error, IndexingConfig, KbChatResult};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveCharacterSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: default_separators(),
        }
    }
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", " ", ""].iter().map(|s| s.to_string()).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> KbChatResult<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(config_error!(
                format!(
                    "chunk_overlap ({}) must be smaller than chunk_size ({})",
                    chunk_overlap, chunk_size
                ),
                "splitter"
            ));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: default_separators(),
        })
    }

    pub fn from_config(config: &IndexingConfig) -> KbChatResult<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        // First separator present in the text; "" always matches
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for split in splits {
            if char_len(&split) < self.chunk_size {
                pending.push(split);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }

            if remaining.is_empty() {
                chunks.push(split);
            } else {
                chunks.extend(self.split_with(&split, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending, separator));
        }

        chunks
    }

    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for split in splits {
            let len = char_len(split);
            let joiner = if current.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut chunks, &current, separator);

                // Drop from the front until the kept tail fits the overlap and the next split
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { separator_len }
                            > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                    if !current.is_empty() {
                        total -= separator_len;
                    }
                }
            }

            if !current.is_empty() {
                total += separator_len;
            }
            current.push_back(split);
            total += len;
        }

        push_joined(&mut chunks, &current, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = RecursiveCharacterSplitter::default();
        assert_eq!(
            splitter.split_text("Open 9-5 Monday to Friday"),
            vec!["Open 9-5 Monday to Friday".to_string()]
        );
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let splitter = RecursiveCharacterSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("\n\n  \n").is_empty());
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let splitter = RecursiveCharacterSplitter::new(20, 8).unwrap();
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let chunks = splitter.split_text(text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));

        // Consecutive chunks share at least one word
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].contains(last_word), "{:?}", pair);
        }

        // Every word survives
        for word in text.split(' ') {
            assert!(chunks.iter().any(|c| c.split(' ').any(|w| w == word)));
        }
    }

    #[test]
    fn paragraphs_are_preferred_boundaries() {
        let splitter = RecursiveCharacterSplitter::new(30, 0).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec![
                "First paragraph here.".to_string(),
                "Second paragraph here.".to_string()
            ]
        );
    }

    #[test]
    fn long_words_fall_back_to_characters() {
        let splitter = RecursiveCharacterSplitter::new(4, 1).unwrap();
        let chunks = splitter.split_text("abcdefghij");
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert!(chunks.first().unwrap().starts_with('a'));
        assert!(chunks.last().unwrap().ends_with('j'));
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        assert!(RecursiveCharacterSplitter::new(100, 100).is_err());
        assert!(RecursiveCharacterSplitter::new(0, 0).is_err());
    }
}
