use lopdf::{Document, EncryptionState, EncryptionVersion, Object, ObjectId, Permissions, Stream, StringFormat, dictionary};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use vera2pdf::printer::HtmlPrinter;

/// An A4 document of `pages` pages; the first page carries `links` URI link
/// annotations.
fn fixture_document(pages: usize, links: usize) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut kids = Vec::new();
    for i in 0..pages {
        let content = format!("BT /F1 12 Tf 72 770 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        };
        if i == 0 && links > 0 {
            let annots: Vec<Object> = (0..links)
                .map(|k| {
                    let top = 700 - 30 * k as i64;
                    Object::Reference(doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Link",
                        "Rect" => vec![Object::Integer(72), Object::Integer(top - 20), Object::Integer(300), Object::Integer(top)],
                        "A" => dictionary! {
                            "S" => "URI",
                            "URI" => Object::string_literal(format!("html/pitem_{}.html", k + 1)),
                        },
                    }))
                })
                .collect();
            page.set("Annots", annots);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn write_pdf(path: &Path, pages: usize, links: usize) {
    fixture_document(pages, links).save(path).expect("write fixture PDF");
}

/// Like [`write_pdf`], encrypted with an empty user password.
pub fn write_encrypted_pdf(path: &Path, pages: usize) {
    let mut doc = fixture_document(pages, 0);
    let file_id = Object::String(b"ejednani-priloha".to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);
    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password: "",
        key_length: 128,
        permissions: Permissions::all(),
    })
    .expect("encryption state");
    doc.encrypt(&state).expect("encrypt fixture PDF");
    doc.save(path).expect("write fixture PDF");
}

/// Prints every page as a one-page document, with as many links as
/// `links_for` gives for the page's file stem.
pub struct FakePrinter<F: Fn(&str) -> usize> {
    pub links_for: F,
}

impl<F: Fn(&str) -> usize> HtmlPrinter for FakePrinter<F> {
    fn print(&self, html: &Path, pdf: &Path) -> anyhow::Result<()> {
        assert!(html.is_file(), "printer got a missing page {:?}", html);
        let stem = html.file_stem().unwrap().to_string_lossy();
        write_pdf(pdf, 1, (self.links_for)(&stem));
        Ok(())
    }
}

/// A VERA export with an inline item 1 and a linked item 2 whose detail page
/// lists `attachment` (relative to the detail page).
pub fn write_export(dir: &Path, attachment: &str) -> PathBuf {
    let programme = dir.join("ejednani");
    fs::create_dir_all(programme.join("html")).unwrap();
    fs::create_dir_all(programme.join("prilohy")).unwrap();
    fs::write(
        programme.join("index.html"),
        r#"<html><head><title>Program</title></head><body>
<table class="hlavicka">
  <tr><td>Město Vzor</td><td>erb</td><td>Program</td></tr>
  <tr><td>Program jednání</td><td>12. zasedání Zastupitelstva města</td></tr>
  <tr><td>čtvrtek 12. 10. 2023 od 16:00</td><td>Velký sál radnice</td></tr>
</table>
<table class="program">
  <tr class="popisek"><td>Bod</td><td class="left">Název</td></tr>
  <tr><td>1.</td><td class="left">Zahájení<br><span>Předkládá</span><br><span>: starosta</span><br>-</td></tr>
  <tr><td>2.</td><td class="left"><a href="html/bod2.html">Smlouva o dílo</a></td></tr>
</table>
</body></html>"#,
    )
    .unwrap();
    fs::write(
        programme.join("html/bod2.html"),
        format!(
            r#"<html><head></head><body><div id="content">
<div class="nadpis">Smlouva o dílo</div>
<table class="akteri">
  <tr><td class="predkladatelLabel">Předkládá:</td><td>místostarosta</td></tr>
  <tr><td>Materiál obsahuje:</td><td><a href="{}">Smlouva</a></td></tr>
</table>
<div><div class="prohlaseni">Návrh usnesení:</div><div>Zastupitelstvo schvaluje smlouvu.</div></div>
<table class="podpisy"><tr><td>podpis</td></tr></table>
</div></body></html>"#,
            attachment
        ),
    )
    .unwrap();
    programme
}

/// Writes a zip archive with the given entries.
pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for (name, bytes) in entries {
        zip.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// Target page of every link annotation on `page`, in order.
pub fn link_targets(doc: &Document, page: ObjectId) -> Vec<Option<ObjectId>> {
    let page = doc.get_dictionary(page).unwrap();
    let annots = match page.get(b"Annots") {
        Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_array).cloned().unwrap_or_default(),
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    annots
        .iter()
        .filter_map(|annot| match annot {
            Object::Reference(id) => doc.get_dictionary(*id).ok(),
            Object::Dictionary(d) => Some(d),
            _ => None,
        })
        .filter(|annot| annot.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Link".as_slice()))
        .map(|annot| {
            let dest = match annot.get(b"Dest").ok()? {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            dest.as_array().ok()?.first()?.as_reference().ok()
        })
        .collect()
}
