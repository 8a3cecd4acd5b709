//! Expands zip attachments into one attachment per archived file.

use crate::model::{AgendaItem, Attachment};
use crate::normalize::unique_path;
use crate::text::{decode_entry_name, flatten_entry_name, fold_to_ascii};
use anyhow::{Context, Result};
use log::{error, trace};
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Replaces every zip attachment of every item by the files it contains.
/// Archives that cannot be read stay as they are.
pub fn expand_archives(items: &mut [AgendaItem], archives_dir: &Path) {
    for item in items.iter_mut() {
        let mut expanded = Vec::with_capacity(item.attachments.len());
        for attachment in item.attachments.drain(..) {
            if attachment.extension != "zip" {
                expanded.push(attachment);
                continue;
            }
            match expand_attachment(&attachment, archives_dir) {
                Ok(entries) => expanded.extend(entries),
                Err(e) => {
                    error!("Failed to expand archive {:?} of item {}: {:#}", attachment.name, item.id, e);
                    expanded.push(attachment);
                }
            }
        }
        item.attachments = expanded;
    }
}

/// Writes the non-empty files of a zip attachment into `dir`.
pub fn expand_attachment(attachment: &Attachment, dir: &Path) -> Result<Vec<Attachment>> {
    let source = attachment.files.primary().context("Archive attachment has no file")?;
    let file = File::open(source).with_context(|| format!("Failed to open archive {:?}", source))?;
    let mut zip = zip::ZipArchive::new(file).with_context(|| format!("Failed to read archive {:?}", source))?;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let mut attachments = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .with_context(|| format!("Failed to read entry {} of {:?}", index, source))?;
        if entry.is_dir() || entry.size() == 0 {
            trace!("Skipping {:?} in {:?}", entry.name(), source);
            continue;
        }
        let entry_name = decode_entry_name(entry.name_raw());
        let mut file_name = flatten_entry_name(&fold_to_ascii(&entry_name));
        if file_name.chars().all(|c| c == '.') {
            file_name = format!("entry_{}", index);
        }
        let target = unique_path(dir, &file_name);
        let mut out = File::create(&target).with_context(|| format!("Failed to create {:?}", target))?;
        io::copy(&mut entry, &mut out).with_context(|| format!("Failed to extract {:?}", entry_name))?;
        trace!("Extracted {:?} from {:?} to {:?}", entry_name, source, target);

        let mut extracted = Attachment::new(format!("{}{}", attachment.name, entry_name), target);
        extracted.orig_files = vec![source.to_path_buf()];
        attachments.push(extracted);
    }
    Ok(attachments)
}
