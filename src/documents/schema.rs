//! Tantivy schema for stored chunks.

use tantivy::schema::{
    FAST, Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema, SchemaBuilder,
    TextFieldIndexing, TextOptions,
};

/// Schema fields for chunk storage.
#[derive(Debug)]
pub struct DocumentSchema {
    /// Unique identifier, shared with the vector file.
    pub chunk_id: Field,

    /// Source file path as discovered by the walker.
    pub source_path: Field,

    /// Full chunk text.
    pub content: Field,

    /// Position of the chunk within its document.
    pub chunk_index: Field,

    /// Character offsets in the parent document.
    pub char_start: Field,
    pub char_end: Field,

    /// 1-based page for PDFs.
    pub page: Field,

    /// Worksheet name for spreadsheets.
    pub sheet: Field,

    /// Timestamp when indexed (UTC seconds).
    pub indexed_at: Field,
}

impl DocumentSchema {
    pub fn build() -> (Schema, Self) {
        let mut builder = SchemaBuilder::default();

        let indexed_u64 = NumericOptions::default()
            .set_indexed()
            .set_stored()
            .set_fast();
        let chunk_id = builder.add_u64_field("chunk_id", indexed_u64);

        // Exact match for per-file lookups
        let source_path = builder.add_text_field("source_path", STRING | STORED);

        let text_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("default")
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();
        let content = builder.add_text_field("content", text_options);

        let chunk_index = builder.add_u64_field("chunk_index", STORED);
        let char_start = builder.add_u64_field("char_start", STORED);
        let char_end = builder.add_u64_field("char_end", STORED);
        let page = builder.add_u64_field("page", STORED);
        let sheet = builder.add_text_field("sheet", STRING | STORED);
        let indexed_at = builder.add_u64_field("indexed_at", STORED | FAST);

        let schema = builder.build();

        let document_schema = Self {
            chunk_id,
            source_path,
            content,
            chunk_index,
            char_start,
            char_end,
            page,
            sheet,
            indexed_at,
        };

        (schema, document_schema)
    }
}
