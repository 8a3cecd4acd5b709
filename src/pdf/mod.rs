//! PDF document handle.
//!
//! A `PdfDocument` owns one file on disk and the parsed object graph. Every
//! mutation goes through the handle so the touched objects can be written
//! as an incremental revision; the final compacting save consumes it.

pub mod geometry;
pub mod links;
pub mod repair;
pub mod stamp;
#[cfg(test)]
pub mod testutil;

use anyhow::{Context, Result, anyhow, bail};
use geometry::{PageFrame, Rect};
use log::{debug, trace};
use lopdf::{Dictionary, Document, IncrementalDocument, Object, ObjectId, StringFormat, dictionary};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Open,
    /// Objects changed since the last save.
    Mutated(usize),
    /// Number of incremental revisions written so far.
    Saved(usize),
}

pub struct PdfDocument {
    path: PathBuf,
    bytes: Vec<u8>,
    doc: Document,
    dirty: BTreeSet<ObjectId>,
    state: HandleState,
    revisions: usize,
    footer_font: Option<ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read PDF {:?}", path))?;
        Self::from_bytes(path, bytes)
    }

    /// Writes `doc` to `path` as a fresh file and opens it.
    pub fn create(path: &Path, mut doc: Document) -> Result<Self> {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .with_context(|| format!("Failed to serialize PDF for {:?}", path))?;
        fs::write(path, &bytes).with_context(|| format!("Failed to write PDF {:?}", path))?;
        Self::from_bytes(path, bytes)
    }

    fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        let doc = Document::load_mem(&bytes).with_context(|| format!("Failed to parse PDF {:?}", path))?;
        Ok(PdfDocument {
            path: path.to_path_buf(),
            bytes,
            doc,
            dirty: BTreeSet::new(),
            state: HandleState::Open,
            revisions: 0,
            footer_font: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().values().copied().collect()
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids()
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("page {} out of range in {:?}", index, self.path))
    }

    /// Whether a revision can be appended without rewriting the file.
    ///
    /// Encrypted files would need every new object encrypted, and bytes
    /// after the last `%%EOF` would end up in the middle of the file.
    pub fn can_save_incrementally(&self) -> bool {
        !self.doc.is_encrypted() && ends_at_eof_marker(&self.bytes)
    }

    /// Visible box and rotation of a page, resolving inherited attributes.
    pub fn page_frame(&self, page: ObjectId) -> Result<PageFrame> {
        let bbox = self
            .inherited(page, b"CropBox")
            .or_else(|| self.inherited(page, b"MediaBox"))
            .and_then(|obj| self.rect_of(obj))
            .unwrap_or(Rect::new(0.0, 0.0, geometry::A4_WIDTH_PT, geometry::A4_HEIGHT_PT));
        let rotation = self
            .inherited(page, b"Rotate")
            .and_then(|obj| self.resolve(obj).as_i64().ok())
            .unwrap_or(0);
        Ok(PageFrame::new(bbox, rotation))
    }

    pub(crate) fn inherited(&self, page: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.doc.get_dictionary(page).ok()?;
        // Bounded walk, page trees with parent cycles exist in the wild.
        for _ in 0..64 {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    fn rect_of(&self, obj: &Object) -> Option<Rect> {
        let values: Vec<f32> = self
            .resolve(obj)
            .as_array()
            .ok()?
            .iter()
            .filter_map(|v| number(self.resolve(v)))
            .collect();
        match values[..] {
            [x0, y0, x1, y1] => Some(Rect::new(x0, y0, x1, y1)),
            _ => None,
        }
    }

    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.doc
            .get_object(id)
            .with_context(|| format!("Missing object {:?} in {:?}", id, self.path))
    }

    /// Mutable access to an existing object; marks it for the next revision.
    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.touch(id);
        self.doc
            .get_object_mut(id)
            .with_context(|| format!("Missing object {:?} in {:?}", id, self.path))
    }

    pub fn dictionary_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        self.object_mut(id)?
            .as_dict_mut()
            .with_context(|| format!("Object {:?} is not a dictionary", id))
    }

    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        let id = self.doc.add_object(object);
        self.touch(id);
        id
    }

    fn touch(&mut self, id: ObjectId) {
        self.dirty.insert(id);
        self.state = HandleState::Mutated(self.dirty.len());
    }

    /// Appends the changed objects as a new revision of the file on disk.
    /// Nothing is written when no object changed.
    pub fn save_incremental(&mut self) -> Result<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let mut revision = IncrementalDocument::create_from(self.bytes.clone(), self.doc.clone());
        revision.new_document.version = self.doc.version.clone();
        for id in &self.dirty {
            if let Some(object) = self.doc.objects.get(id) {
                revision.new_document.set_object(*id, object.clone());
            }
        }
        let mut bytes = Vec::with_capacity(self.bytes.len());
        revision
            .save_to(&mut bytes)
            .with_context(|| format!("Failed to build revision for {:?}", self.path))?;
        fs::write(&self.path, &bytes).with_context(|| format!("Failed to write PDF {:?}", self.path))?;

        // Reload so the next revision chains onto this one.
        self.doc = Document::load_mem(&bytes).with_context(|| format!("Failed to reload PDF {:?}", self.path))?;
        self.bytes = bytes;
        self.revisions += 1;
        trace!("Saved revision {} of {:?} ({} objects)", self.revisions, self.path, self.dirty.len());
        self.dirty.clear();
        self.state = HandleState::Saved(self.revisions);
        Ok(())
    }

    fn pages_root(&self) -> Result<ObjectId> {
        self.doc
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .with_context(|| format!("No page tree in {:?}", self.path))
    }

    /// Appends every page of `other` after the last page. Returns the
    /// number of pages added.
    pub fn append_document(&mut self, other: Document) -> Result<usize> {
        self.splice_document(other, false)
    }

    /// Inserts every page of `other` in front of the first page.
    pub fn prepend_document(&mut self, other: Document) -> Result<usize> {
        self.splice_document(other, true)
    }

    fn splice_document(&mut self, mut other: Document, front: bool) -> Result<usize> {
        let root = self.pages_root()?;
        let old_count = self.page_count();

        inline_inherited_attributes(&mut other)?;
        other.renumber_objects_with(self.doc.max_id + 1);
        let added: Vec<ObjectId> = other.get_pages().values().copied().collect();
        for &page in &added {
            other
                .get_object_mut(page)
                .and_then(Object::as_dict_mut)
                .context("Page is not a dictionary")?
                .set("Parent", root);
        }

        let new_ids: Vec<ObjectId> = other.objects.keys().copied().collect();
        self.doc.objects.extend(other.objects);
        self.doc.max_id = self.doc.objects.keys().map(|id| id.0).max().unwrap_or(0);
        for id in new_ids {
            self.touch(id);
        }

        let node = self.dictionary_mut(root)?;
        let kids = node
            .get_mut(b"Kids")
            .and_then(Object::as_array_mut)
            .context("Page tree root has no Kids")?;
        let refs = added.iter().map(|&id| Object::Reference(id));
        if front {
            let tail = std::mem::take(kids);
            kids.extend(refs);
            kids.extend(tail);
        } else {
            kids.extend(refs);
        }
        node.set("Count", Object::Integer((old_count + added.len()) as i64));

        debug!(
            "{} {} pages {} {:?}",
            if front { "Prepended" } else { "Appended" },
            added.len(),
            if front { "to" } else { "onto" },
            self.path
        );
        Ok(added.len())
    }

    /// Replaces the document information dictionary.
    pub fn set_info(&mut self, entries: &[(&str, &str)]) -> Result<()> {
        let mut info = Dictionary::new();
        for &(key, value) in entries {
            info.set(key, pdf_text(value));
        }
        let id = self.add_object(info);
        self.doc.trailer.set("Info", id);
        Ok(())
    }

    /// Footer font object, created on first use.
    pub(crate) fn footer_font(&mut self) -> ObjectId {
        if let Some(id) = self.footer_font {
            return id;
        }
        let id = self.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.footer_font = Some(id);
        id
    }

    /// Compacting save to `output`: drops unreachable objects, renumbers and
    /// compresses streams. Consumes the handle.
    pub fn finalize(mut self, output: &Path) -> Result<usize> {
        let pages = self.page_count();
        if pages == 0 {
            bail!("Refusing to write {:?} without pages", output);
        }
        let pruned = self.doc.prune_objects();
        self.doc.renumber_objects();
        self.doc.compress();
        self.doc
            .save(output)
            .with_context(|| format!("Failed to write {:?}", output))?;
        debug!(
            "Final save of {:?} to {:?}: {} pages, {} objects pruned, {} incremental revisions",
            self.path,
            output,
            pages,
            pruned.len(),
            self.revisions
        );
        Ok(pages)
    }
}

/// Copies inheritable attributes from the page tree onto each page, so
/// pages can be moved under another parent without changing their look.
fn inline_inherited_attributes(doc: &mut Document) -> Result<()> {
    let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page in pages {
        let mut found: Vec<(&[u8], Object)> = Vec::new();
        let mut node = doc.get_dictionary(page)?;
        for _ in 0..64 {
            let Ok(parent) = node.get(b"Parent").and_then(Object::as_reference) else {
                break;
            };
            let Ok(parent_node) = doc.get_dictionary(parent) else {
                break;
            };
            for key in INHERITABLE {
                let own = doc.get_dictionary(page)?.has(key);
                if !own && !found.iter().any(|(k, _)| *k == key) {
                    if let Ok(value) = parent_node.get(key) {
                        found.push((key, value.clone()));
                    }
                }
            }
            node = parent_node;
        }
        if found.is_empty() {
            continue;
        }
        let dict = doc.get_object_mut(page).and_then(Object::as_dict_mut)?;
        for (key, value) in found {
            dict.set(key.to_vec(), value);
        }
    }
    Ok(())
}

fn ends_at_eof_marker(bytes: &[u8]) -> bool {
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
    bytes[..end].ends_with(b"%%EOF")
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Text string: plain literal for ASCII, UTF-16BE with BOM otherwise.
pub fn pdf_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::testutil::{a4_pages, document_with_pages, write_encrypted_fixture, write_fixture};
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn incremental_saves_keep_earlier_bytes() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "a.pdf", &a4_pages(2), 0);
        let original = fs::read(&path).unwrap();

        let mut pdf = PdfDocument::open(&path).unwrap();
        assert!(pdf.can_save_incrementally());
        let page = pdf.page_id(1).unwrap();
        pdf.dictionary_mut(page).unwrap().set("Rotate", Object::Integer(90));
        assert_eq!(pdf.state(), HandleState::Mutated(1));
        pdf.save_incremental().unwrap();
        assert_eq!(pdf.state(), HandleState::Saved(1));

        let updated = fs::read(&path).unwrap();
        assert!(updated.starts_with(&original));
        assert!(updated.len() > original.len());

        let reread = PdfDocument::open(&path).unwrap();
        assert!(reread.can_save_incrementally());
        assert_eq!(reread.page_count(), 2);
        assert_eq!(reread.page_frame(reread.page_id(1).unwrap()).unwrap().rotation, 90);
        assert_eq!(reread.page_frame(reread.page_id(0).unwrap()).unwrap().rotation, 0);
    }

    #[test]
    fn revisions_chain_onto_each_other() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "a.pdf", &a4_pages(1), 0);
        let mut pdf = PdfDocument::open(&path).unwrap();
        pdf.append_document(document_with_pages(&a4_pages(2), 0)).unwrap();
        pdf.save_incremental().unwrap();
        let page = pdf.page_id(2).unwrap();
        pdf.dictionary_mut(page).unwrap().set("Rotate", Object::Integer(180));
        pdf.save_incremental().unwrap();
        assert_eq!(pdf.state(), HandleState::Saved(2));

        let reread = Document::load(&path).unwrap();
        let pages: Vec<ObjectId> = reread.get_pages().values().copied().collect();
        assert_eq!(pages.len(), 3);
        let rotate = reread.get_dictionary(pages[2]).unwrap().get(b"Rotate").unwrap();
        assert_eq!(rotate.as_i64().unwrap(), 180);
        // One trailer per revision, each pointing at the one before.
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.windows(5).filter(|w| *w == b"/Prev").count(), 2);
    }

    #[test]
    fn trailing_bytes_and_encryption_need_a_rewrite() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "padded.pdf", &a4_pages(1), 0);
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0u8; 64]);
        bytes.extend_from_slice(b"\r\n");
        fs::write(&path, &bytes).unwrap();
        let padded = PdfDocument::open(&path).unwrap();
        assert_eq!(padded.page_count(), 1);
        assert!(!padded.can_save_incrementally());

        let locked = write_encrypted_fixture(dir.path(), "locked.pdf", &a4_pages(2));
        let locked = PdfDocument::open(&locked).unwrap();
        assert_eq!(locked.page_count(), 2);
        assert!(!locked.can_save_incrementally());
    }

    #[test]
    fn saving_without_changes_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "a.pdf", &a4_pages(1), 0);
        let before = fs::read(&path).unwrap();
        let mut pdf = PdfDocument::open(&path).unwrap();
        pdf.save_incremental().unwrap();
        assert_eq!(pdf.state(), HandleState::Open);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn sections_concatenate_in_order() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "index.pdf", &a4_pages(3), 0);
        let mut pdf = PdfDocument::open(&path).unwrap();
        assert_eq!(pdf.append_document(document_with_pages(&a4_pages(2), 0)).unwrap(), 2);
        assert_eq!(pdf.append_document(document_with_pages(&[(842.0, 595.0); 4], 0)).unwrap(), 4);
        assert_eq!(pdf.page_count(), 9);
        pdf.save_incremental().unwrap();

        let reread = PdfDocument::open(&path).unwrap();
        assert_eq!(reread.page_count(), 9);
        assert!(!reread.page_frame(reread.page_id(4).unwrap()).unwrap().is_landscape());
        assert!(reread.page_frame(reread.page_id(5).unwrap()).unwrap().is_landscape());
    }

    #[test]
    fn prepended_pages_come_first() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "body.pdf", &a4_pages(2), 0);
        let mut pdf = PdfDocument::open(&path).unwrap();
        let first_before = pdf.page_id(0).unwrap();
        pdf.prepend_document(document_with_pages(&[(400.0, 600.0)], 0)).unwrap();
        assert_eq!(pdf.page_count(), 3);
        assert_eq!(pdf.page_id(1).unwrap(), first_before);
        assert_eq!(pdf.page_frame(pdf.page_id(0).unwrap()).unwrap().width(), 400.0);
    }

    #[test]
    fn inherited_attributes_survive_a_merge() {
        let mut other = document_with_pages(&a4_pages(1), 0);
        let page = *other.get_pages().values().next().unwrap();
        let parent = other.get_dictionary(page).unwrap().get(b"Parent").unwrap().as_reference().unwrap();
        other.get_object_mut(parent).unwrap().as_dict_mut().unwrap().set("Rotate", Object::Integer(90));

        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "base.pdf", &a4_pages(1), 0);
        let mut pdf = PdfDocument::open(&path).unwrap();
        pdf.append_document(other).unwrap();
        assert_eq!(pdf.page_frame(pdf.page_id(1).unwrap()).unwrap().rotation, 90);
    }

    #[test]
    fn finalize_writes_a_compact_copy() {
        let dir = tempdir().unwrap();
        let path = write_fixture(dir.path(), "work.pdf", &a4_pages(2), 0);
        let mut pdf = PdfDocument::open(&path).unwrap();
        pdf.append_document(document_with_pages(&a4_pages(1), 0)).unwrap();
        pdf.set_info(&[("Title", "Zasedání"), ("Creator", "vera2pdf")]).unwrap();
        pdf.save_incremental().unwrap();

        let out = dir.path().join("out.pdf");
        assert_eq!(pdf.finalize(&out).unwrap(), 3);
        let doc = Document::load(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        let info = doc.trailer.get(b"Info").and_then(Object::as_reference).unwrap();
        assert!(doc.get_dictionary(info).unwrap().has(b"Title"));
    }

    #[test]
    fn non_ascii_text_is_utf16() {
        match pdf_text("Bod č") {
            Object::String(bytes, StringFormat::Hexadecimal) => assert_eq!(&bytes[..2], &[0xFE, 0xFF]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(pdf_text("Bod"), Object::String(bytes, StringFormat::Literal) if bytes == b"Bod"));
    }
}
