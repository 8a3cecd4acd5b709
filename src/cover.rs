//! Cover/Title Inserter.

use crate::Metadata;
use crate::document_builder::build_cover_pdf;
use crate::model::MeetingHeader;
use crate::pdf::PdfDocument;
use anyhow::{Context, Result};
use log::info;
use lopdf::Document;
use std::path::Path;

/// Generates the cover at `cover_path` and puts it in front of `pdf`.
/// Returns the number of cover pages.
pub fn prepend_cover(pdf: &mut PdfDocument, header: &MeetingHeader, metadata: &Metadata, cover_path: &Path) -> Result<usize> {
    build_cover_pdf(header, metadata, cover_path)?;
    let cover = Document::load(cover_path).with_context(|| format!("Failed to load cover {:?}", cover_path))?;
    let pages = pdf.prepend_document(cover)?;
    pdf.save_incremental()?;
    info!("Cover page inserted ({} pages)", pages);
    Ok(pages)
}
