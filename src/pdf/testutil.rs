//! Fixture PDFs for unit tests.

use lopdf::{Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream, StringFormat, dictionary};
use std::path::{Path, PathBuf};

/// A document with one page per `(width, height)` entry. The first page
/// carries `links` URI link annotations stacked from the top.
pub fn document_with_pages(sizes: &[(f32, f32)], links: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (i, &(w, h)) in sizes.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 72 {} Td (Page {}) Tj ET", h - 72.0, i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(w), Object::Real(h)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        };
        if i == 0 && links > 0 {
            let annots: Vec<Object> = (0..links)
                .map(|k| {
                    let top = h - 100.0 - 30.0 * k as f32;
                    let id = doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Link",
                        "Rect" => vec![Object::Real(72.0), Object::Real(top - 20.0), Object::Real(300.0), Object::Real(top)],
                        "A" => dictionary! {
                            "S" => "URI",
                            "URI" => Object::string_literal(format!("html/pitem_{}.html", k + 1)),
                        },
                    });
                    Object::Reference(id)
                })
                .collect();
            page.set("Annots", annots);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn a4_pages(count: usize) -> Vec<(f32, f32)> {
    vec![(595.0, 842.0); count]
}

/// Saves a fixture document to `dir/name` and returns the path.
pub fn write_fixture(dir: &Path, name: &str, sizes: &[(f32, f32)], links: usize) -> PathBuf {
    let path = dir.join(name);
    let mut doc = document_with_pages(sizes, links);
    doc.save(&path).unwrap();
    path
}

/// Saves a fixture encrypted with an empty user password, the way many
/// office suites export "protected" files.
pub fn write_encrypted_fixture(dir: &Path, name: &str, sizes: &[(f32, f32)]) -> PathBuf {
    let path = dir.join(name);
    let mut doc = document_with_pages(sizes, 0);
    let file_id = Object::String(b"vera2pdf-fixture".to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);
    let version = EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password: "",
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).unwrap();
    doc.encrypt(&state).unwrap();
    doc.save(&path).unwrap();
    path
}
