//! JSON run report written next to the output PDF.

use crate::layout::LengthVector;
use crate::model::{AgendaItem, Attachment, MeetingHeader};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub output: &'a Path,
    pub header: &'a MeetingHeader,
    pub page_count: usize,
    /// Pages in front of the programme (the cover).
    pub leading_pages: usize,
    pub lengths: &'a LengthVector,
    pub items: Vec<ItemReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ItemReport<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub start_page: Option<usize>,
    pub attachments: Vec<AttachmentReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentReport<'a> {
    pub name: &'a str,
    pub extension: &'a str,
    pub file: Option<&'a Path>,
    pub original_files: &'a [PathBuf],
}

impl<'a> From<&'a Attachment> for AttachmentReport<'a> {
    fn from(attachment: &'a Attachment) -> Self {
        AttachmentReport {
            name: &attachment.name,
            extension: &attachment.extension,
            file: attachment.files.primary(),
            original_files: &attachment.orig_files,
        }
    }
}

impl<'a> RunReport<'a> {
    pub fn new(
        output: &'a Path,
        header: &'a MeetingHeader,
        items: &'a [AgendaItem],
        lengths: &'a LengthVector,
        leading_pages: usize,
        page_count: usize,
    ) -> Self {
        RunReport {
            output,
            header,
            page_count,
            leading_pages,
            lengths,
            items: items
                .iter()
                .map(|item| ItemReport {
                    id: &item.id,
                    name: &item.name,
                    start_page: item.pdf_start_page,
                    attachments: item.attachments.iter().map(AttachmentReport::from).collect(),
                })
                .collect(),
        }
    }

    /// Report path for an output PDF: same stem, `.json` extension.
    pub fn path_for(output: &Path) -> PathBuf {
        output.with_extension("json")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))
    }
}
