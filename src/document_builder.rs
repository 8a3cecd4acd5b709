//! Document Builder Module
//!
//! Creates the PDFs that are generated in-process rather than printed: the
//! single-page wrappers around raster image attachments and the cover page.

use crate::Metadata;
use crate::model::MeetingHeader;
use crate::pdf::geometry::{A4_HEIGHT_PT, A4_WIDTH_PT};
use crate::text::fold_to_ascii;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageOutputFormat};
use log::debug;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Blank border around an image page.
const IMAGE_MARGIN_PT: f32 = 18.0;
const COVER_MARGIN_PT: f32 = 56.0;

/// Places the raster image at `image_path` on a single A4 portrait page,
/// scaled uniformly and centred within the margin.
pub fn image_to_pdf(image_path: &Path, output_path: &Path) -> Result<()> {
    let image = image::open(image_path).with_context(|| format!("Failed to decode image {:?}", image_path))?;
    let bytes = build_image_pdf(&image)?;
    fs::write(output_path, bytes).with_context(|| format!("Failed to write PDF {:?}", output_path))?;
    debug!("Wrapped image {:?} into {:?}", image_path, output_path);
    Ok(())
}

fn build_image_pdf(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut pdf = Pdf::new();
    let mut ref_counter = std::iter::successors(Some(1), |n| Some(n + 1)).map(Ref::new);
    let mut next_ref = || ref_counter.next().unwrap_or(Ref::new(i32::MAX));

    let catalog_ref = next_ref();
    let page_tree_ref = next_ref();
    let page_ref = next_ref();
    let content_ref = next_ref();
    let image_ref = next_ref();
    let image_name = Name(b"Im1");

    pdf.catalog(catalog_ref).pages(page_tree_ref);
    pdf.pages(page_tree_ref).kids([page_ref]).count(1);

    let rgb = image.to_rgb8();
    let (image_width, image_height) = rgb.dimensions();
    let (x, y, w, h) = fit_centered(image_width as f32, image_height as f32);

    let mut page = pdf.page(page_ref);
    page.media_box(Rect::new(0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT));
    page.parent(page_tree_ref);
    page.contents(content_ref);
    page.resources().x_objects().pair(image_name, image_ref);
    page.finish();

    let mut content = Content::new();
    content.save_state();
    content.transform([w, 0.0, 0.0, h, x, y]);
    content.x_object(image_name);
    content.restore_state();
    pdf.stream(content_ref, &content.finish());

    let mut encoded_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut encoded_bytes);
    DynamicImage::ImageRgb8(rgb).write_to(&mut cursor, ImageOutputFormat::Jpeg(85))?;

    let mut image_xobject = pdf.image_xobject(image_ref, &encoded_bytes);
    image_xobject.filter(Filter::DctDecode);
    image_xobject.width(image_width as i32);
    image_xobject.height(image_height as i32);
    image_xobject.color_space().device_rgb();
    image_xobject.bits_per_component(8);
    image_xobject.finish();

    Ok(pdf.finish())
}

/// Position and size `(x, y, w, h)` of an image scaled into the A4 area
/// inside the margin, preserving its aspect ratio.
fn fit_centered(image_width: f32, image_height: f32) -> (f32, f32, f32, f32) {
    let area_width = A4_WIDTH_PT - 2.0 * IMAGE_MARGIN_PT;
    let area_height = A4_HEIGHT_PT - 2.0 * IMAGE_MARGIN_PT;
    let scale = (area_width / image_width.max(1.0)).min(area_height / image_height.max(1.0));
    let (w, h) = (image_width * scale, image_height * scale);
    ((A4_WIDTH_PT - w) / 2.0, (A4_HEIGHT_PT - h) / 2.0, w, h)
}

/// Writes a one-page cover with the meeting header and publishing metadata.
pub fn build_cover_pdf(header: &MeetingHeader, metadata: &Metadata, output_path: &Path) -> Result<()> {
    let mut pdf = Pdf::new();
    let mut ref_counter = std::iter::successors(Some(1), |n| Some(n + 1)).map(Ref::new);
    let mut next_ref = || ref_counter.next().unwrap_or(Ref::new(i32::MAX));

    let catalog_ref = next_ref();
    let page_tree_ref = next_ref();
    let page_ref = next_ref();
    let content_ref = next_ref();
    let font_ref = next_ref();
    let bold_ref = next_ref();

    pdf.catalog(catalog_ref).pages(page_tree_ref);
    pdf.pages(page_tree_ref).kids([page_ref]).count(1);
    pdf.type1_font(font_ref).base_font(Name(b"Helvetica"));
    pdf.type1_font(bold_ref).base_font(Name(b"Helvetica-Bold"));

    let mut page = pdf.page(page_ref);
    page.media_box(Rect::new(0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT));
    page.parent(page_tree_ref);
    page.contents(content_ref);
    let mut resources = page.resources();
    resources.fonts().pair(Name(b"Helvetica"), font_ref).pair(Name(b"Helvetica-Bold"), bold_ref);
    resources.finish();
    page.finish();

    let mut lines: Vec<(&[u8], f32, String)> = Vec::new();
    let mut block = |font: &'static [u8], size: f32, text: &str| {
        for line in wrap(&fold_to_ascii(text), size) {
            lines.push((font, size, line));
        }
    };
    block(b"Helvetica-Bold", 24.0, &header.designator);
    block(b"Helvetica", 16.0, &header.title);
    block(b"Helvetica", 14.0, &header.time);
    block(b"Helvetica", 14.0, &header.location);
    for (label, value) in [
        ("Autor", &metadata.author),
        ("Zpracoval", &metadata.contributor),
        ("Zdroj", &metadata.source),
    ] {
        if let Some(value) = value {
            block(b"Helvetica", 10.0, &format!("{}: {}", label, value));
        }
    }

    let mut content = Content::new();
    content.begin_text();
    let mut y = A4_HEIGHT_PT * 0.66;
    let mut previous_size = None;
    for (font, size, line) in &lines {
        if previous_size.is_some_and(|p| p != *size) {
            y -= size * 0.8;
        }
        previous_size = Some(*size);
        content.set_font(Name(*font), *size);
        content.set_text_matrix([1.0, 0.0, 0.0, 1.0, COVER_MARGIN_PT, y]);
        content.show(Str(line.as_bytes()));
        y -= size * 1.3;
    }
    content.end_text();
    pdf.stream(content_ref, &content.finish());

    if let Some(parent_dir) = output_path.parent() {
        fs::create_dir_all(parent_dir).context("Failed to create cover parent directory")?;
    }
    fs::write(output_path, pdf.finish()).context("Failed to write cover PDF")?;
    debug!("Cover written to {:?}", output_path);
    Ok(())
}

/// Greedy word wrap for the cover text width.
fn wrap(text: &str, size: f32) -> Vec<String> {
    let max_chars = (((A4_WIDTH_PT - 2.0 * COVER_MARGIN_PT) / (0.5 * size)) as usize).max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
