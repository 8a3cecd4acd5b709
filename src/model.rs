//! Source Model
//!
//! Plain records describing one meeting export: the programme header, the
//! ordered agenda items and the attachments hanging off each item.

use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Meeting header parsed from the `hlavicka` table of `index.html`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeetingHeader {
    pub title: String,
    /// Meeting designator, e.g. "9. zasedání Zastupitelstva města".
    pub designator: String,
    /// Free-form date and time line, e.g. "čtvrtek 12. 10. 2023 od 16:00".
    pub time: String,
    pub location: String,
}

/// Current file state of an attachment.
///
/// `Unmerged` only exists between normalization and the per-item build,
/// where the parts get merged into the first file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "paths", rename_all = "snake_case")]
pub enum AttachmentFiles {
    Single(PathBuf),
    Unmerged(Vec<PathBuf>),
}

impl AttachmentFiles {
    /// The file every later stage reads from: the single file, or the first part.
    pub fn primary(&self) -> Option<&Path> {
        match self {
            AttachmentFiles::Single(path) => Some(path),
            AttachmentFiles::Unmerged(paths) => paths.first().map(PathBuf::as_path),
        }
    }

    pub fn paths(&self) -> Vec<&Path> {
        match self {
            AttachmentFiles::Single(path) => vec![path.as_path()],
            AttachmentFiles::Unmerged(paths) => paths.iter().map(PathBuf::as_path).collect(),
        }
    }

    pub fn paths_mut(&mut self) -> Vec<&mut PathBuf> {
        match self {
            AttachmentFiles::Single(path) => vec![path],
            AttachmentFiles::Unmerged(paths) => paths.iter_mut().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    /// Lower-case extension without the leading dot.
    pub extension: String,
    pub files: AttachmentFiles,
    pub orig_files: Vec<PathBuf>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        let extension = extension_of(&path);
        Attachment {
            id: Uuid::new_v4(),
            name: name.into(),
            extension,
            orig_files: vec![path.clone()],
            files: AttachmentFiles::Single(path),
        }
    }

    /// Same attachment, new identity, pointing at a replacement file.
    pub fn with_file(&self, path: PathBuf) -> Self {
        Attachment {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            extension: extension_of(&path),
            files: AttachmentFiles::Single(path),
            orig_files: self.orig_files.clone(),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.extension == "pdf"
    }
}

/// One numbered matter of the programme.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgendaItem {
    /// Ordinal as printed in the agenda, dots removed ("1", "2a", ...).
    pub id: String,
    pub name: String,
    pub time: Option<String>,
    pub resolution: Option<String>,
    pub presenter: Option<String>,
    pub processor: Option<String>,
    pub reason_text: Option<String>,
    pub attachments: Vec<Attachment>,
    /// Detail page of the item; `None` for inline items.
    pub link: Option<PathBuf>,
    pub temp_link: Option<PathBuf>,
    pub pdf_temp_file: Option<PathBuf>,
    pub pdf_start_page: Option<usize>,
}

impl AgendaItem {
    pub fn is_inline(&self) -> bool {
        self.link.is_none()
    }
}

/// Lower-case extension of `path` without the dot, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
