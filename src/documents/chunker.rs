//! Document chunking.
//!
//! Provides the `Chunker` trait and a sliding-window implementation that splits
//! each document independently into overlapping fixed-size segments.

use super::config::ChunkingConfig;
use super::types::{Chunk, Document};

/// A raw chunk before metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// Character range in the source text (start, end).
    pub char_range: (usize, usize),

    /// The text content of this chunk.
    pub content: String,
}

impl RawChunk {
    pub fn new(char_range: (usize, usize), content: String) -> Self {
        Self {
            char_range,
            content,
        }
    }

    /// Get character count.
    pub fn char_count(&self) -> usize {
        self.char_range.1 - self.char_range.0
    }
}

/// Trait for document chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split text into chunks.
    fn split(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk>;

    /// Split one document, attaching its metadata to every chunk.
    fn chunk(&self, document: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
        self.split(&document.content, config)
            .into_iter()
            .enumerate()
            .map(|(index, raw)| Chunk {
                content: raw.content,
                char_range: raw.char_range,
                index,
                metadata: document.metadata.clone(),
            })
            .collect()
    }

    /// Split many documents. Chunks never span two documents.
    fn chunk_all(&self, documents: &[Document], config: &ChunkingConfig) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk(doc, config))
            .collect()
    }
}

/// Fixed-size sliding window over characters.
///
/// Windows start every `chunk_size - overlap` characters and are at most
/// `chunk_size` long. Consecutive windows share exactly `overlap` characters;
/// only the last window may be shorter. Whitespace-only text yields no chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlidingWindowChunker;

impl SlidingWindowChunker {
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for SlidingWindowChunker {
    fn split(&self, content: &str, config: &ChunkingConfig) -> Vec<RawChunk> {
        if content.trim().is_empty() || config.chunk_size == 0 {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end
        let boundaries: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        let step = config.step();

        let mut chunks = Vec::with_capacity(total_chars / step + 1);
        let mut start = 0;
        loop {
            let end = (start + config.chunk_size).min(total_chars);
            chunks.push(RawChunk::new(
                (start, end),
                content[boundaries[start]..boundaries[end]].to_string(),
            ));

            if end >= total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Rebuild the original text from consecutive chunks of one document.
///
/// Inverse of [`SlidingWindowChunker`] for the same `overlap`.
pub fn reassemble(chunks: &[RawChunk], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(&chunk.content);
        } else {
            text.extend(chunk.content.chars().skip(overlap));
        }
    }
    text
}
