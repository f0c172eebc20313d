//! PDF side of pdfoutliner.
//!
//! Extracts positioned, styled text spans from a document for
//! [`outliner_core::find_outline`], and reads or replaces the document's
//! native outline (bookmarks).

use std::path::Path;

use outliner_core::{OutlineItem, RawPage};
use thiserror::Error;

use parser::backend::LopdfBackend;

pub mod outline;
pub mod parser;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot write outline: {0}")]
    Outline(String),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// A loaded PDF document.
///
/// Constructed via [`PdfDocument::from_bytes`] or [`PdfDocument::open`].
/// Text extraction and outline reads work on the in-memory document; outline
/// writes take effect on the next [`PdfDocument::save`].
pub struct PdfDocument {
    backend: LopdfBackend,
}

impl PdfDocument {
    /// Parse PDF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(Self {
            backend: LopdfBackend::load_bytes(bytes)?,
        })
    }

    /// Read and parse a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn page_count(&self) -> usize {
        self.backend.page_count()
    }

    /// Extract the text layout of every page.
    pub fn pages(&self) -> Result<Vec<RawPage>, PdfError> {
        parser::layout::extract_pages(&self.backend)
    }

    /// The document's existing outline, empty when it has none.
    pub fn outline(&self) -> Result<Vec<OutlineItem>, PdfError> {
        outline::read_outline(&self.backend)
    }

    /// Replace the document's outline. Items at a depth below `fold_level`
    /// are shown expanded.
    pub fn set_outline(&mut self, items: &[OutlineItem], fold_level: usize) -> Result<(), PdfError> {
        outline::write_outline(&mut self.backend, items, fold_level)
    }

    /// Serialize the document.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        let mut bytes = Vec::new();
        self.backend
            .raw_doc_mut()
            .save_to(&mut bytes)
            .map_err(|e| PdfError::Parse(format!("cannot serialize document: {}", e)))?;
        Ok(bytes)
    }

    /// Write the document to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Convenience free functions
// ---------------------------------------------------------------------------

/// Extract the text layout of every page of a PDF.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<RawPage>, PdfError> {
    PdfDocument::from_bytes(bytes)?.pages()
}

/// Read the outline of a PDF without keeping the document around.
pub fn read_outline(bytes: &[u8]) -> Result<Vec<OutlineItem>, PdfError> {
    PdfDocument::from_bytes(bytes)?.outline()
}
