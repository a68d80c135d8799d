//! Format-specific document loaders.
//!
//! Dispatches on file extension:
//! - `pdf`  - one document per non-empty page
//! - `docx` - one document per file, paragraphs separated by newlines
//! - `xlsx` - one document per non-empty worksheet, cells tab separated
//! - `txt`, `md` - one document per file, strict UTF-8

use std::io::Read;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use calamine::{Reader, open_workbook_auto};
use quick_xml::events::Event;
use thiserror::Error;

use super::types::{Document, DocumentMetadata};

/// Errors from loading a single file.
///
/// These are recoverable: the indexing pipeline records them and moves on.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is not valid UTF-8")]
    Encoding,

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("DOCX error: {0}")]
    Docx(String),

    #[error("XLSX error: {0}")]
    Xlsx(String),
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Text,
}

impl DocumentFormat {
    /// Detect format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "txt" | "md" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Text => "text",
        }
    }
}

/// Load a file into documents using the loader for its extension.
pub fn load_document(path: &Path) -> Result<Vec<Document>, LoadError> {
    let format =
        DocumentFormat::from_path(path).ok_or_else(|| LoadError::Unsupported(path.to_path_buf()))?;

    match format {
        DocumentFormat::Pdf => load_pdf(path),
        DocumentFormat::Docx => load_docx(path),
        DocumentFormat::Xlsx => load_xlsx(path),
        DocumentFormat::Text => load_text(path),
    }
}

fn load_text(path: &Path) -> Result<Vec<Document>, LoadError> {
    let bytes = std::fs::read(path)?;
    let mut content = String::from_utf8(bytes).map_err(|_| LoadError::Encoding)?;
    if content.starts_with('\u{feff}') {
        content.remove(0);
    }

    Ok(vec![Document::new(content, DocumentMetadata::new(path))])
}

fn load_pdf(path: &Path) -> Result<Vec<Document>, LoadError> {
    // Check readability first so IO problems surface as IO errors
    std::fs::metadata(path)?;

    // pdf-extract panics on some malformed inputs
    let pages = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)))
        .map_err(|_| LoadError::Pdf("parser panicked on malformed input".to_string()))?
        .map_err(|e| LoadError::Pdf(e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| {
            Document::new(text, DocumentMetadata::new(path).with_page(i as u32 + 1))
        })
        .collect())
}

fn load_docx(path: &Path) -> Result<Vec<Document>, LoadError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| LoadError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| LoadError::Docx(e.to_string()))?
        .read_to_string(&mut xml)?;

    let content = docx_xml_to_text(&xml).map_err(|e| LoadError::Docx(e.to_string()))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Document::new(content, DocumentMetadata::new(path))])
}

/// Extract plain text from a WordprocessingML body.
///
/// Text runs (`w:t`) are concatenated, paragraphs (`w:p`) end with a newline,
/// `w:tab` becomes a tab and `w:br`/`w:cr` become newlines.
pub fn docx_xml_to_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => text.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

fn load_xlsx(path: &Path) -> Result<Vec<Document>, LoadError> {
    std::fs::metadata(path)?;
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::Xlsx(e.to_string()))?;

    let mut documents = Vec::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| LoadError::Xlsx(format!("sheet '{sheet}': {e}")))?;

        let content = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.to_string())
                    .collect::<Vec<_>>()
                    .join("\t")
                    .trim_end()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if !content.trim().is_empty() {
            documents.push(Document::new(
                content,
                DocumentMetadata::new(path).with_sheet(sheet),
            ));
        }
    }

    Ok(documents)
}
