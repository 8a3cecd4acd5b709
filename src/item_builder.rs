//! Per-Item PDF Builder
//!
//! Prints an agenda item's page, then appends every PDF attachment after
//! repairing, merging, rotating and stamping it, and finally links the item
//! pages and the attachment pages to each other.

use crate::WorkDirs;
use crate::html_edit::{edit_item_page, write_inline_item};
use crate::linker::link_item;
use crate::model::{AgendaItem, Attachment, AttachmentFiles, MeetingHeader};
use crate::pdf::PdfDocument;
use crate::pdf::repair::{repaired_path, rewrite_compacted};
use crate::pdf::stamp::{footer_text, rotate_landscape_pages, stamp_footer};
use crate::printer::HtmlPrinter;
use anyhow::{Context, Result, bail};
use log::{debug, error, info, trace};
use lopdf::Document;
use std::path::{Path, PathBuf};

/// Result of building one item document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemBuild {
    pub pdf: PathBuf,
    /// Pages printed from the item's own page.
    pub item_pages: usize,
    /// Pages contributed by each attachment, in attachment order.
    pub attachment_pages: Vec<usize>,
}

impl ItemBuild {
    pub fn total_pages(&self) -> usize {
        self.item_pages + self.attachment_pages.iter().sum::<usize>()
    }
}

/// Builds the PDF of `item` in the scratch directories.
pub fn build_item(
    item: &mut AgendaItem,
    header: &MeetingHeader,
    dirs: &WorkDirs,
    printer: &dyn HtmlPrinter,
) -> Result<ItemBuild> {
    let html = dirs.html.join(format!("pitem_{}.html", item.id));
    match item.link.clone() {
        Some(link) => {
            let base = link.parent().unwrap_or(Path::new("."));
            edit_item_page(item, &link, base, &html)?;
        }
        None => write_inline_item(item, header, &html)?,
    }
    item.temp_link = Some(html.clone());

    let pdf_path = dirs.items.join(format!("pitem_{}.pdf", item.id));
    printer
        .print(&html, &pdf_path)
        .with_context(|| format!("Failed to print item {}", item.id))?;
    info!("Programme item {} written in {:?}", item.id, pdf_path.file_name().unwrap_or_default());
    item.pdf_temp_file = Some(pdf_path.clone());

    let mut pdf = open_appendable(&pdf_path)?;
    let item_pages = pdf.page_count();

    let mut attachment_pages = Vec::with_capacity(item.attachments.len());
    for index in 0..item.attachments.len() {
        let pages = match append_attachment(&mut pdf, item, index, dirs) {
            Ok(pages) => pages,
            Err(e) => {
                error!("Attachment {:?} of item {} left out: {:#}", item.attachments[index].name, item.id, e);
                0
            }
        };
        attachment_pages.push(pages);
    }
    pdf.save_incremental()?;

    link_item(&mut pdf, item_pages, &attachment_pages)?;
    let build = ItemBuild { pdf: pdf_path, item_pages, attachment_pages };
    if build.total_pages() != pdf.page_count() {
        bail!(
            "Item {} has {} pages, {} expected",
            item.id,
            pdf.page_count(),
            build.total_pages()
        );
    }
    debug!("Item {} built: {} + {:?} pages", item.id, build.item_pages, build.attachment_pages);
    Ok(build)
}

/// Opens a PDF, rewriting it first when it cannot take incremental revisions.
pub fn open_appendable(path: &Path) -> Result<PdfDocument> {
    let pdf = PdfDocument::open(path)?;
    if pdf.can_save_incrementally() {
        return Ok(pdf);
    }
    drop(pdf);
    rewrite_compacted(path, path)?;
    PdfDocument::open(path)
}

/// Prepares attachment `index` of `item` and appends it onto `pdf`.
/// Returns the number of pages appended.
fn append_attachment(pdf: &mut PdfDocument, item: &mut AgendaItem, index: usize, dirs: &WorkDirs) -> Result<usize> {
    let attachment = &mut item.attachments[index];
    if !attachment.is_pdf() {
        debug!("Attachment {:?} is not a PDF ({}), no pages", attachment.name, attachment.extension);
        return Ok(0);
    }
    repair_parts(attachment, &dirs.attachments)?;
    let mut document = merge_parts(attachment)?;
    let pages = document.page_count();
    if pages == 0 {
        return Ok(0);
    }

    let rotated = rotate_landscape_pages(&mut document)?;
    if rotated > 0 {
        debug!("Rotated {} pages of {:?}", rotated, attachment.name);
    }
    info!("Adding footer to attachment {:?}", document.path().file_name().unwrap_or_default());
    for (n, page) in document.page_ids().into_iter().enumerate() {
        let text = footer_text(n + 1, pages, &item.id, &item.name, &attachment.name);
        stamp_footer(&mut document, page, &text)?;
    }
    document.save_incremental()?;

    let stamped = Document::load(document.path())
        .with_context(|| format!("Failed to reload {:?}", document.path()))?;
    let appended = pdf.append_document(stamped)?;
    trace!("Appended {} pages of {:?} to item {}", appended, attachment.name, item.id);
    Ok(appended)
}

/// Replaces every part that cannot take an incremental revision by a
/// rewritten copy.
fn repair_parts(attachment: &mut Attachment, attachments_dir: &Path) -> Result<()> {
    for (i, path) in attachment.files.paths_mut().into_iter().enumerate() {
        let pdf = PdfDocument::open(path)?;
        if pdf.can_save_incrementally() {
            continue;
        }
        drop(pdf);
        let target = repaired_path(attachments_dir, path, i);
        rewrite_compacted(path, &target)?;
        trace!("Attachment part {:?} replaced by repaired {:?}", path, target);
        *path = target;
    }
    Ok(())
}

/// Merges the parts of an attachment into its first file.
fn merge_parts(attachment: &mut Attachment) -> Result<PdfDocument> {
    let paths: Vec<PathBuf> = attachment.files.paths().into_iter().map(Path::to_path_buf).collect();
    let (first, rest) = paths.split_first().context("Attachment has no files")?;
    let mut document = PdfDocument::open(first)?;
    for part in rest {
        let other = Document::load(part).with_context(|| format!("Failed to load part {:?}", part))?;
        document.append_document(other)?;
    }
    if !rest.is_empty() {
        document.save_incremental()?;
        debug!("Merged {} parts of {:?} ({} pages)", paths.len(), attachment.name, document.page_count());
    }
    attachment.files = AttachmentFiles::Single(first.clone());
    Ok(document)
}
