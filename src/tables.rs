//! Table extraction: the external collaborator that turns a PDF into
//! tabular text blocks.
//!
//! The pipeline only ever sees the [`TableSource`] trait, so the extraction
//! backend can be swapped (or mocked in tests) without touching pipeline
//! logic. The bundled [`PdfTableSource`] uses `pdf-extract`'s text layer —
//! adequate for digitally-generated invoices, where the oracle does the
//! heavy lifting of deciding which lines are line items. Scanned invoices
//! would need an OCR-backed implementation of the same trait.

use crate::error::TableExtractError;
use std::path::Path;
use tracing::{debug, info};

/// One tabular text block extracted from a document.
#[derive(Debug, Clone)]
pub struct TableBlock {
    /// Raw text of the block, as fed to the oracle.
    pub text: String,
}

/// Extraction collaborator boundary.
pub trait TableSource: Send + Sync {
    /// Extract all tabular blocks from the file at `path`.
    ///
    /// Returns [`TableExtractError::NotFound`] when the path does not exist
    /// and [`TableExtractError::Failed`] for any backend failure. A readable
    /// file with no text yields an empty vec, not an error.
    fn extract_tables(&self, path: &Path) -> Result<Vec<TableBlock>, TableExtractError>;
}

/// `pdf-extract`-backed table source.
///
/// Emits the document's text as page-sized blocks (pdf-extract separates
/// pages with form feeds). Blocks that are pure whitespace are dropped so
/// blank pages never reach the oracle.
#[derive(Debug, Default)]
pub struct PdfTableSource;

impl PdfTableSource {
    pub fn new() -> Self {
        Self
    }
}

impl TableSource for PdfTableSource {
    fn extract_tables(&self, path: &Path) -> Result<Vec<TableBlock>, TableExtractError> {
        if !path.exists() {
            return Err(TableExtractError::NotFound {
                path: path.to_path_buf(),
            });
        }

        info!("Extracting tables from {}", path.display());
        let text =
            pdf_extract::extract_text(path).map_err(|e| TableExtractError::Failed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let blocks: Vec<TableBlock> = text
            .split('\u{c}')
            .filter(|block| !block.trim().is_empty())
            .map(|block| TableBlock {
                text: block.trim().to_string(),
            })
            .collect();

        debug!(
            "Extracted {} non-empty block(s) from {}",
            blocks.len(),
            path.display()
        );
        Ok(blocks)
    }
}
