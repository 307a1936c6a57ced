//! Document chunking.
//!
//! Splits raw document text into retrieval-sized units. Markdown headings
//! open a new section carrying the heading as metadata; oversized sections
//! are further divided into overlapping windows that prefer to end on a
//! sentence boundary.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::config::ChunkingConfig;

/// Positional and source metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating document identifier (usually a filename).
    pub source: String,
    /// Section heading the chunk falls under, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub heading: Option<String>,
    /// Sequential position within the whole document (not per section).
    pub index: usize,
}

/// The atomic retrieval unit: a bounded piece of document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

struct Section {
    heading: Option<String>,
    text: String,
}

fn heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#{1,6}\s+(.+)$").unwrap())
}

/// Splits documents into [`Chunk`]s.
pub struct ChunkingService {
    max_chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingService {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            max_chunk_size: config.max_chunk_size.max(1),
            chunk_overlap: config.chunk_overlap,
        }
    }

    /// Split `content` into chunks attributed to `source`.
    ///
    /// Empty content yields zero chunks; this is not an error. Chunk ids are
    /// derived from the source and the document-wide index, so re-ingesting
    /// the same source reproduces the same ids.
    pub fn chunk_document(&self, content: &str, source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut index = 0;

        for section in split_by_headings(content) {
            for piece in self.split_oversized(section.text.trim()) {
                chunks.push(Chunk {
                    id: format!("{source}-chunk-{index}"),
                    text: piece,
                    metadata: ChunkMetadata {
                        source: source.to_string(),
                        heading: section.heading.clone(),
                        index,
                    },
                });
                index += 1;
            }
        }

        tracing::debug!("Chunked '{}' into {} chunks", source, chunks.len());
        chunks
    }

    /// Divide an oversized section into overlapping windows. Each window
    /// after the first starts `chunk_overlap` characters before the end of
    /// the previous one.
    fn split_oversized(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.max_chunk_size {
            return if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            };
        }

        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = (start + self.max_chunk_size).min(chars.len());
            if end < chars.len() {
                if let Some(cut) = sentence_cut(&chars[start..end]) {
                    end = start + cut;
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }

            if end >= chars.len() {
                break;
            }
            let next = end.saturating_sub(self.chunk_overlap);
            // Guard against a pathological overlap >= window size.
            start = if next > start { next } else { end };
        }

        pieces
    }
}

fn split_by_headings(content: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section {
        heading: None,
        text: String::new(),
    };

    for line in content.lines() {
        if let Some(captures) = heading_pattern().captures(line) {
            if !current.text.trim().is_empty() {
                sections.push(current);
            }
            current = Section {
                heading: Some(captures[1].to_string()),
                text: format!("{line}\n"),
            };
        } else {
            current.text.push_str(line);
            current.text.push('\n');
        }
    }

    if !current.text.trim().is_empty() {
        sections.push(current);
    }

    sections
}

/// Pull the split point back to the last ". " or newline past half the
/// window, so sentences are not severed mid-way. Returns the cut position
/// (exclusive) within the window, or `None` when no boundary qualifies.
fn sentence_cut(window: &[char]) -> Option<usize> {
    let half = window.len() / 2;
    let mut i = window.len();
    while i > half + 1 {
        i -= 1;
        match window[i] {
            '\n' => return Some(i + 1),
            ' ' if window[i - 1] == '.' => return Some(i + 1),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(max_chunk_size: usize, chunk_overlap: usize) -> ChunkingService {
        ChunkingService::new(ChunkingConfig {
            max_chunk_size,
            chunk_overlap,
        })
    }

    fn default_service() -> ChunkingService {
        ChunkingService::new(ChunkingConfig::default())
    }

    #[test]
    fn splits_on_markdown_headings() {
        let chunks =
            default_service().chunk_document("# Intro\nHello\n\n# Setup\nStep one.", "doc.md");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.heading.as_deref(), Some("Intro"));
        assert_eq!(chunks[1].metadata.heading.as_deref(), Some("Setup"));
        assert!(chunks[0].text.contains("Hello"));
        assert!(chunks[1].text.contains("Step one."));
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        assert!(default_service().chunk_document("", "empty.md").is_empty());
        assert!(default_service()
            .chunk_document("   \n\n  ", "blank.md")
            .is_empty());
    }

    #[test]
    fn document_without_headings_is_one_chunk() {
        let chunks = default_service().chunk_document("Just a paragraph.\nAnother line.", "a.txt");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.heading.is_none());
        assert_eq!(chunks[0].metadata.index, 0);
    }

    #[test]
    fn indices_and_ids_are_document_wide() {
        let chunks = default_service().chunk_document("# A\none\n# B\ntwo\n# C\nthree", "d.md");
        let indices: Vec<usize> = chunks.iter().map(|c| c.metadata.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(chunks[2].id, "d.md-chunk-2");
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        let chunks = default_service().chunk_document("#tag line\nbody", "d.md");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.heading.is_none());
    }

    #[test]
    fn oversized_section_is_windowed_with_overlap() {
        let text = "This is a sentence. ".repeat(20); // 400 chars
        let chunks = service(100, 20).chunk_document(&text, "long.txt");

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.text.trim().is_empty());
            assert!(chunk.text.chars().count() <= 100);
        }
        // Same heading scope, sequential indices.
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.index, i);
        }
    }

    #[test]
    fn windows_prefer_sentence_boundaries() {
        let text = "This is a sentence. ".repeat(20);
        let chunks = service(90, 10).chunk_document(&text, "long.txt");
        // Every window except possibly the last has a boundary past half the
        // window, so each should end with a complete sentence.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.ends_with('.'), "severed: {:?}", chunk.text);
        }
    }

    #[test]
    fn all_non_blank_lines_are_covered() {
        let content = "# Guide\nFirst line.\nSecond line.\n\n# More\nThird line.";
        let chunks = default_service().chunk_document(content, "g.md");
        let combined: String = chunks.iter().map(|c| c.text.as_str()).collect();

        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            assert!(combined.contains(line.trim()), "missing line: {line}");
        }
    }

    #[test]
    fn unicode_content_does_not_split_mid_character() {
        let text = "日本語のテキストです。".repeat(30);
        let chunks = service(50, 10).chunk_document(&text, "jp.txt");
        assert!(!chunks.is_empty());
        // Would have panicked on a byte-slicing implementation.
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 50);
        }
    }
}
