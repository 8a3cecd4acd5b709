//! Programme Assembler
//!
//! Joins the printed index and the item documents into one file and records
//! how many pages each of them contributed.

use crate::item_builder::open_appendable;
use crate::layout::LengthVector;
use crate::pdf::PdfDocument;
use anyhow::{Context, Result, ensure};
use log::{debug, info};
use lopdf::Document;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Assembly {
    pub pdf: PdfDocument,
    pub lengths: LengthVector,
}

/// Copies `index_pdf` to `joined` and appends every item document onto it,
/// in order.
pub fn assemble(index_pdf: &Path, item_pdfs: &[PathBuf], joined: &Path) -> Result<Assembly> {
    fs::copy(index_pdf, joined).with_context(|| format!("Failed to copy {:?} to {:?}", index_pdf, joined))?;
    let mut pdf = open_appendable(joined)?;
    let mut lengths = LengthVector::new(pdf.page_count());

    for item_pdf in item_pdfs {
        let document = Document::load(item_pdf).with_context(|| format!("Failed to load item {:?}", item_pdf))?;
        let pages = pdf.append_document(document)?;
        lengths.push(pages);
        debug!("Joined {:?} ({} pages)", item_pdf.file_name().unwrap_or_default(), pages);
    }
    pdf.save_incremental()?;

    ensure!(
        lengths.len() == item_pdfs.len() + 1,
        "Length vector has {} entries for {} items",
        lengths.len(),
        item_pdfs.len()
    );
    ensure!(
        lengths.total() == pdf.page_count(),
        "Joined programme has {} pages but its parts add up to {}",
        pdf.page_count(),
        lengths.total()
    );
    info!("Successfully joined programme with {} items ({} pages)", item_pdfs.len(), pdf.page_count());
    Ok(Assembly { pdf, lengths })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testutil::{a4_pages, write_fixture};
    use tempfile::tempdir;

    #[test]
    fn sections_follow_each_other() {
        let dir = tempdir().unwrap();
        let index = write_fixture(dir.path(), "index.pdf", &a4_pages(3), 0);
        let items = vec![
            write_fixture(dir.path(), "pitem_1.pdf", &a4_pages(2), 0),
            write_fixture(dir.path(), "pitem_2.pdf", &a4_pages(4), 0),
        ];
        let assembly = assemble(&index, &items, &dir.path().join("joined.pdf")).unwrap();
        assert_eq!(assembly.lengths.lengths(), &[3, 2, 4]);
        assert_eq!(assembly.pdf.page_count(), 9);
        assert_eq!(
            (0..3).map(|k| assembly.lengths.offset(k)).collect::<Vec<_>>(),
            vec![0, 3, 5]
        );

        // The index copy is untouched.
        assert_eq!(Document::load(&index).unwrap().get_pages().len(), 3);
        assert_eq!(Document::load(dir.path().join("joined.pdf")).unwrap().get_pages().len(), 9);
    }

    #[test]
    fn no_items_leaves_the_index() {
        let dir = tempdir().unwrap();
        let index = write_fixture(dir.path(), "index.pdf", &a4_pages(1), 0);
        let assembly = assemble(&index, &[], &dir.path().join("joined.pdf")).unwrap();
        assert_eq!(assembly.lengths.lengths(), &[1]);
    }
}
