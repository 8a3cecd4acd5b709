//! Rewrites PDFs that cannot take an incremental revision.
//!
//! Broken cross-reference tables, files truncated after the last `%%EOF` and
//! encrypted files are loaded leniently and written out as a fresh, compact
//! single-revision file.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use lopdf::Document;
use std::path::{Path, PathBuf};

/// Scratch path of the `index`-th repaired copy of `source`.
pub fn repaired_path(attachments_dir: &Path, source: &Path, index: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    attachments_dir.join(format!("{}_{}.pdf", stem, index))
}

/// Loads `source`, drops encryption and writes a compacted copy to
/// `target`. Returns the page count of the copy.
pub fn rewrite_compacted(source: &Path, target: &Path) -> Result<usize> {
    let mut doc = Document::load(source).with_context(|| format!("Failed to load {:?} for repair", source))?;
    if doc.trailer.remove(b"Encrypt").is_some() {
        doc.encryption_state = None;
        debug!("Dropped encryption dictionary of {:?}", source);
    }
    let pages = doc.get_pages().len();
    if pages == 0 {
        bail!("{:?} has no pages", source);
    }
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    doc.save(target)
        .with_context(|| format!("Failed to write repaired copy {:?}", target))?;
    info!("Successfully repaired {:?} into {:?} ({} pages)", source, target, pages);
    Ok(pages)
}
