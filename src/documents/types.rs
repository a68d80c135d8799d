//! Core types for loaded documents and their chunks.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

/// Unique identifier for a stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(NonZeroU32);

impl ChunkId {
    /// Create a ChunkId from a u32, returning None if zero.
    pub fn from_u32(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Get the inner value as u32.
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Convert to bytes for storage (little-endian).
    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.get().to_le_bytes()
    }

    /// Create from bytes (little-endian).
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        Self::from_u32(u32::from_le_bytes(bytes))
    }
}

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path of the source file, as discovered by the walker.
    pub source: PathBuf,

    /// 1-based page number for paginated formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Worksheet name for spreadsheets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

impl DocumentMetadata {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            page: None,
            sheet: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Source path as displayed in citations.
    pub fn source_display(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }
}

/// Raw text extracted from a file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn source(&self) -> &Path {
        &self.metadata.source
    }

    /// Length in characters.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// A bounded slice of one document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text of this chunk.
    pub content: String,

    /// Character range in the parent document (start, end).
    pub char_range: (usize, usize),

    /// Position of this chunk within its document.
    pub index: usize,

    /// Metadata inherited from the parent document.
    pub metadata: DocumentMetadata,
}

impl Chunk {
    /// Get a preview of the content (first N characters).
    pub fn preview(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            self.content.clone()
        } else {
            let mut preview: String = self.content.chars().take(max_chars).collect();
            preview.push_str("...");
            preview
        }
    }

    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}
