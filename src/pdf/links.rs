//! Link annotations: enumeration, retargeting and insertion.
//!
//! Destinations are written as explicit `[page /Fit]` arrays holding the page
//! object reference, so they keep pointing at the same page after the page
//! tree is merged into a larger document.

use super::PdfDocument;
use super::geometry::Rect;
use anyhow::{Context, Result, bail};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

/// Where a link annotation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHandle {
    /// Indirect annotation object.
    Object(ObjectId),
    /// Direct dictionary at `index` of the `Annots` array owned by `holder`
    /// (the page itself, or an indirect array object).
    Inline { holder: ObjectId, index: usize },
}

/// Link annotations of a page in `Annots` order.
pub fn links_on_page(pdf: &PdfDocument, page: ObjectId) -> Result<Vec<LinkHandle>> {
    let page_dict = pdf.document().get_dictionary(page)?;
    let (holder, entries) = match page_dict.get(b"Annots") {
        Ok(Object::Array(entries)) => (page, entries),
        Ok(Object::Reference(id)) => (*id, pdf.get_object(*id)?.as_array()?),
        _ => return Ok(Vec::new()),
    };

    let mut links = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match entry {
            Object::Reference(id) => {
                if pdf.get_object(*id).and_then(|o| Ok(o.as_dict()?)).is_ok_and(is_link) {
                    links.push(LinkHandle::Object(*id));
                }
            }
            Object::Dictionary(dict) if is_link(dict) => links.push(LinkHandle::Inline { holder, index }),
            _ => {}
        }
    }
    Ok(links)
}

fn is_link(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Link")
}

fn link_mut(pdf: &mut PdfDocument, handle: LinkHandle) -> Result<&mut Dictionary> {
    match handle {
        LinkHandle::Object(id) => pdf.dictionary_mut(id),
        LinkHandle::Inline { holder, index } => {
            let entries = match pdf.object_mut(holder)? {
                Object::Dictionary(page) => page.get_mut(b"Annots")?.as_array_mut()?,
                Object::Array(entries) => entries,
                _ => bail!("Annotation holder {:?} is neither a page nor an array", holder),
            };
            entries
                .get_mut(index)
                .context("Annotation index out of range")?
                .as_dict_mut()
                .context("Inline annotation is not a dictionary")
        }
    }
}

fn destination(target: ObjectId) -> Object {
    Object::Array(vec![Object::Reference(target), Object::Name(b"Fit".to_vec())])
}

/// Points an existing link at `target`, dropping any previous action.
pub fn retarget_link(pdf: &mut PdfDocument, handle: LinkHandle, target: ObjectId) -> Result<()> {
    let link = link_mut(pdf, handle)?;
    link.remove(b"A");
    link.set("Dest", destination(target));
    Ok(())
}

/// Adds an invisible link covering `visible` (top-left origin, as shown in
/// a viewer) on `page`, jumping to `target`.
pub fn insert_link(pdf: &mut PdfDocument, page: ObjectId, visible: Rect, target: ObjectId) -> Result<ObjectId> {
    let rect = pdf.page_frame(page)?.to_user_rect(visible);
    let annot = pdf.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![
            Object::Real(rect.x0),
            Object::Real(rect.y0),
            Object::Real(rect.x1),
            Object::Real(rect.y1),
        ],
        "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
        "Dest" => destination(target),
        "P" => page,
    });

    let annots = pdf.document().get_dictionary(page)?.get(b"Annots").ok().cloned();
    match annots {
        Some(Object::Reference(id)) => pdf.object_mut(id)?.as_array_mut()?.push(Object::Reference(annot)),
        Some(Object::Array(_)) => pdf
            .dictionary_mut(page)?
            .get_mut(b"Annots")?
            .as_array_mut()?
            .push(Object::Reference(annot)),
        _ => pdf.dictionary_mut(page)?.set("Annots", vec![Object::Reference(annot)]),
    }
    Ok(annot)
}

/// Target page of an annotation's explicit `/Dest`, if it has one.
pub fn destination_page(doc: &Document, annot: &Dictionary) -> Option<ObjectId> {
    let dest = match annot.get(b"Dest").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    dest.as_array().ok()?.first()?.as_reference().ok()
}
