//! Attachment Normalizer
//!
//! Brings every attachment into the scratch directory as a PDF: office
//! documents go through the external converter, raster images are wrapped
//! in-process, PDFs are copied, anything else is copied unchanged and later
//! contributes no pages.

use crate::converter::OfficeConverter;
use crate::document_builder::image_to_pdf;
use crate::model::{AgendaItem, Attachment, AttachmentFiles, extension_of};
use anyhow::{Context, Result, anyhow};
use log::{error, info, trace};
use std::fs;
use std::path::{Path, PathBuf};

pub const OFFICE_EXTENSIONS: [&str; 10] = ["doc", "docx", "odt", "xls", "xlsx", "ods", "ppt", "pptx", "odp", "txt"];
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "psd"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Office,
    Image,
    Other,
}

impl FileKind {
    pub fn of(extension: &str) -> Self {
        if extension == "pdf" {
            FileKind::Pdf
        } else if OFFICE_EXTENSIONS.contains(&extension) {
            FileKind::Office
        } else if IMAGE_EXTENSIONS.contains(&extension) {
            FileKind::Image
        } else {
            FileKind::Other
        }
    }
}

/// What happened to one attachment.
#[derive(Debug)]
pub enum AttachmentOutcome {
    Converted(Attachment),
    /// Unsupported type, copied with its own extension.
    PassedThrough(Attachment),
    /// Conversion failed; the attachment is kept as it was.
    Failed { original: Attachment, error: anyhow::Error },
}

impl AttachmentOutcome {
    pub fn into_attachment(self) -> Attachment {
        match self {
            AttachmentOutcome::Converted(a) | AttachmentOutcome::PassedThrough(a) => a,
            AttachmentOutcome::Failed { original, .. } => original,
        }
    }
}

pub struct Normalizer<'a> {
    attachments_dir: PathBuf,
    converter_override: Option<&'a Path>,
    converter: Option<OfficeConverter>,
}

impl<'a> Normalizer<'a> {
    pub fn new(attachments_dir: impl Into<PathBuf>, converter_override: Option<&'a Path>) -> Self {
        Normalizer {
            attachments_dir: attachments_dir.into(),
            converter_override,
            converter: None,
        }
    }

    /// Normalizes the attachments of every item in place. Only a missing
    /// office converter is an error.
    pub fn normalize_items(&mut self, items: &mut [AgendaItem]) -> Result<()> {
        fs::create_dir_all(&self.attachments_dir)
            .with_context(|| format!("Failed to create {:?}", self.attachments_dir))?;
        for item in items.iter_mut() {
            let mut normalized = Vec::with_capacity(item.attachments.len());
            for attachment in item.attachments.drain(..) {
                match self.normalize(attachment)? {
                    AttachmentOutcome::Failed { original, error } => {
                        error!("Failed to normalize {:?} of item {}: {:#}", original.name, item.id, error);
                        normalized.push(original);
                    }
                    outcome => normalized.push(outcome.into_attachment()),
                }
            }
            item.attachments = normalized;
        }
        Ok(())
    }

    pub fn normalize(&mut self, attachment: Attachment) -> Result<AttachmentOutcome> {
        let sources: Vec<PathBuf> = attachment.files.paths().into_iter().map(Path::to_path_buf).collect();
        let mut converted = Vec::with_capacity(sources.len());
        let mut passed_through = false;
        for source in &sources {
            let kind = FileKind::of(&extension_of(source));
            if kind == FileKind::Office {
                self.converter()?;
            }
            match self.normalize_file(source, kind) {
                Ok(path) => {
                    passed_through |= kind == FileKind::Other;
                    converted.push(path);
                }
                Err(error) => return Ok(AttachmentOutcome::Failed { original: attachment, error }),
            }
        }

        let Some(first) = converted.first().cloned() else {
            let error = anyhow!("attachment has no files");
            return Ok(AttachmentOutcome::Failed { original: attachment, error });
        };
        let mut result = attachment.with_file(first);
        if converted.len() > 1 {
            result.files = AttachmentFiles::Unmerged(converted);
        }
        Ok(if passed_through {
            AttachmentOutcome::PassedThrough(result)
        } else {
            AttachmentOutcome::Converted(result)
        })
    }

    fn normalize_file(&mut self, source: &Path, kind: FileKind) -> Result<PathBuf> {
        if !source.is_file() {
            return Err(anyhow!("file {:?} does not exist", source));
        }
        let name = source.file_name().context("Attachment file has no name")?;
        match kind {
            FileKind::Office => {
                let converter = self.converter()?.clone();
                let scratch = tempfile::tempdir_in(&self.attachments_dir)
                    .context("Failed to create conversion directory")?;
                let produced = converter.convert(source, scratch.path())?;
                let target = unique_path(&self.attachments_dir, &produced.file_name().unwrap_or(name).to_string_lossy());
                fs::rename(&produced, &target).with_context(|| format!("Failed to move {:?}", produced))?;
                info!("Successfully converted {:?}", name);
                Ok(target)
            }
            FileKind::Image => {
                let stem = source.file_stem().unwrap_or(name).to_string_lossy();
                let target = unique_path(&self.attachments_dir, &format!("{}.pdf", stem));
                image_to_pdf(source, &target)?;
                info!("Successfully converted image {:?}", name);
                Ok(target)
            }
            FileKind::Pdf | FileKind::Other => {
                let target = unique_path(&self.attachments_dir, &name.to_string_lossy());
                fs::copy(source, &target).with_context(|| format!("Failed to copy {:?}", source))?;
                trace!("Copied {:?} to {:?}", source, target);
                Ok(target)
            }
        }
    }

    /// The office converter, located on first use.
    fn converter(&mut self) -> Result<&OfficeConverter> {
        if self.converter.is_none() {
            self.converter = Some(OfficeConverter::locate(self.converter_override)?);
        }
        self.converter.as_ref().context("Office converter unavailable")
    }
}

/// `dir/name`, or `dir/<stem>_<n>.<ext>` when that is taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    (1..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, extension)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Trace of every item's attachments, after a normalization stage.
pub fn trace_attachments(stage: &str, items: &[AgendaItem]) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }
    for item in items {
        trace!("{}: item {}", stage, item.id);
        for attachment in &item.attachments {
            trace!("\t{} {:?} [{}] {:?}", attachment.id, attachment.name, attachment.extension, attachment.files);
        }
    }
}
