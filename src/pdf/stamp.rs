//! Page stamping: footer bands and rotation.

use super::PdfDocument;
use super::geometry::{PageFrame, Rect, portrait_rotation};
use crate::text::{fold_to_ascii, truncate_chars};
use anyhow::Result;
use log::trace;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use pdf_writer::{Content, Name, Str};

/// Resource name of the footer font, chosen to avoid clashing with the
/// names producers usually pick.
const FOOTER_FONT: &[u8] = b"VeraHelv";

// Footer band geometry on an A4 page, scaled with the page height.
const BAND_HEIGHT: f32 = 18.0;
const FONT_SIZE: f32 = 11.0;
const BASELINE_FROM_BOTTOM: f32 = 5.0;
const TEXT_INSET: f32 = 6.0;

/// Footer line for page `page` (1-based) of `pages` of an attachment.
pub fn footer_text(page: usize, pages: usize, item_id: &str, item_name: &str, attachment_name: &str) -> String {
    let names = if item_name.chars().count() + attachment_name.chars().count() > 105 {
        let item: String = item_name.chars().take(25).collect();
        let attachment: String = attachment_name.chars().take(80).collect();
        format!("{} # {}", item, attachment)
    } else {
        format!("{} # {}", item_name, attachment_name)
    };
    fold_to_ascii(&format!("Strana {} z {} # Bod {} - {}", page, pages, item_id, names))
}

pub fn set_rotation(pdf: &mut PdfDocument, page: ObjectId, degrees: i32) -> Result<()> {
    pdf.dictionary_mut(page)?.set("Rotate", Object::Integer(i64::from(degrees)));
    Ok(())
}

/// Turns every landscape page upright. Returns how many pages changed.
pub fn rotate_landscape_pages(pdf: &mut PdfDocument) -> Result<usize> {
    let mut rotated = 0;
    for page in pdf.page_ids() {
        if let Some(degrees) = portrait_rotation(&pdf.page_frame(page)?) {
            set_rotation(pdf, page, degrees)?;
            rotated += 1;
        }
    }
    Ok(rotated)
}

/// Draws a white band with `text` across the visible bottom of `page`.
pub fn stamp_footer(pdf: &mut PdfDocument, page: ObjectId, text: &str) -> Result<()> {
    let frame = pdf.page_frame(page)?;
    let font = pdf.footer_font();
    add_font_resource(pdf, page, font)?;

    let overlay = footer_content(&frame, text);
    let open = pdf.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut close = b"\nQ\n".to_vec();
    close.extend_from_slice(&overlay);
    let close = pdf.add_object(Stream::new(Dictionary::new(), close));

    let mut contents = vec![Object::Reference(open)];
    contents.extend(existing_contents(pdf, page));
    contents.push(Object::Reference(close));
    pdf.dictionary_mut(page)?.set("Contents", contents);
    trace!("Stamped footer on {:?}: {}", page, text);
    Ok(())
}

fn footer_content(frame: &PageFrame, text: &str) -> Vec<u8> {
    let s = frame.scale();
    let (w, h) = (frame.width(), frame.height());
    let band = frame.to_user_rect(Rect::new(0.0, h - BAND_HEIGHT * s, w, h));
    let size = FONT_SIZE * s;
    // Helvetica averages about half an em per character.
    let max_chars = ((w - 2.0 * TEXT_INSET * s) / (0.5 * size)).max(0.0) as usize;
    let text = truncate_chars(&fold_to_ascii(text), max_chars);

    let mut content = Content::new();
    content.save_state();
    content.set_fill_gray(1.0);
    content.set_stroke_gray(1.0);
    content.set_line_width(0.0);
    content.rect(band.x0, band.y0, band.width(), band.height());
    content.fill_nonzero_and_stroke();
    content.set_fill_gray(0.0);
    content.begin_text();
    content.set_font(Name(FOOTER_FONT), size);
    content.set_text_matrix(frame.text_matrix(TEXT_INSET * s, h - BASELINE_FROM_BOTTOM * s));
    content.show(Str(text.as_bytes()));
    content.end_text();
    content.restore_state();
    content.finish().to_vec()
}

fn existing_contents(pdf: &PdfDocument, page: ObjectId) -> Vec<Object> {
    let Ok(page_dict) = pdf.document().get_dictionary(page) else {
        return Vec::new();
    };
    match page_dict.get(b"Contents") {
        Ok(Object::Array(parts)) => parts.clone(),
        Ok(Object::Reference(id)) => match pdf.document().get_object(*id) {
            Ok(Object::Array(parts)) => parts.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}

/// Gives the page its own resource dictionary with the footer font added.
/// Shared or inherited resources are copied, never changed in place.
fn add_font_resource(pdf: &mut PdfDocument, page: ObjectId, font: ObjectId) -> Result<()> {
    let mut resources = pdf
        .inherited(page, b"Resources")
        .and_then(|obj| pdf.resolve(obj).as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| pdf.resolve(obj).as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    fonts.set(FOOTER_FONT.to_vec(), font);
    resources.set("Font", fonts);
    if !resources.has(b"ProcSet") {
        resources.set(
            "ProcSet",
            vec![Object::Name(b"PDF".to_vec()), Object::Name(b"Text".to_vec())],
        );
    }
    pdf.dictionary_mut(page)?.set("Resources", resources);
    Ok(())
}
