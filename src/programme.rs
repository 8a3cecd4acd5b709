//! VERA programme parser.
//!
//! Reads `index.html` of an export (meeting header plus the agenda table) and
//! the detail page of every linked agenda item.

use crate::dom::{self, Handle};
use crate::error::FatalError;
use crate::model::{AgendaItem, Attachment, MeetingHeader};
use crate::text::collapse_whitespace;
use anyhow::Result;
use log::{debug, error, trace};
use std::path::{Component, Path, PathBuf};

pub const INDEX_FILE: &str = "index.html";

const PRESENTER_LABEL_CLASS: &str = "predkladatelLabel";
const PROCESSOR_LABEL: &str = "Zpracovatel:";
const RATIONALE_LABEL: &str = "Text důvodové zprávy:";
const ATTACHMENTS_LABEL: &str = "Materiál obsahuje:";
const RESOLUTION_CLASS: &str = "prohlaseni";

#[derive(Debug, Clone)]
pub struct Programme {
    pub header: MeetingHeader,
    pub items: Vec<AgendaItem>,
    pub index_path: PathBuf,
}

/// Parses the export in `dir`.
pub fn parse_programme(dir: &Path) -> Result<Programme> {
    let index_path = dir.join(INDEX_FILE);
    let dom = dom::load(&index_path)?;
    let header = parse_header(&dom.document)?;
    let items = parse_items(&dom.document, dir)?;
    debug!("Parsed {} agenda items of {:?}", items.len(), header.designator);
    Ok(Programme { header, items, index_path })
}

pub fn parse_header(document: &Handle) -> Result<MeetingHeader, FatalError> {
    let table = dom::find(document, |n| dom::is_tag_with_class(n, "table", "hlavicka"))
        .ok_or_else(|| FatalError::format("no table.hlavicka in the programme"))?;
    let cells: Vec<String> = table_rows(&table)
        .iter()
        .flat_map(row_cells)
        .map(|cell| collapse_whitespace(&dom::leading_text(&cell)))
        .collect();
    if cells.len() < 5 {
        return Err(FatalError::format(format!(
            "table.hlavicka has {} cells, at least 5 expected",
            cells.len()
        )));
    }
    let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
    Ok(MeetingHeader {
        title: cell(3),
        designator: cell(4),
        time: cell(5),
        location: cell(6),
    })
}

pub fn parse_items(document: &Handle, dir: &Path) -> Result<Vec<AgendaItem>> {
    let table = dom::find(document, |n| dom::is_tag_with_class(n, "table", "program"))
        .ok_or_else(|| FatalError::format("no table.program in the programme"))?;
    let mut items = Vec::new();
    for row in table_rows(&table).iter().skip(1) {
        items.push(parse_row(row, dir)?);
    }
    Ok(items)
}

fn parse_row(row: &Handle, dir: &Path) -> Result<AgendaItem> {
    let cells = row_cells(row);
    if cells.len() != 2 && cells.len() != 4 {
        return Err(FatalError::format(format!("agenda row with {} cells", cells.len())).into());
    }
    let mut item = AgendaItem {
        id: collapse_whitespace(&dom::all_text(&cells[0]).replace('.', "")),
        ..AgendaItem::default()
    };
    if cells.len() == 4 {
        item.time = non_empty(collapse_whitespace(&dom::all_text(&cells[2])));
    }

    let link = dom::element_children(&cells[1])
        .into_iter()
        .find(|c| dom::is_tag(c, "a") && dom::attr(c, "href").is_some());
    match link {
        Some(a) => {
            item.name = collapse_whitespace(&dom::all_text(&a));
            let href = dom::attr(&a, "href").unwrap_or_default();
            let page = normalize_path(&dir.join(href));
            if let Err(e) = parse_detail_page(&mut item, &page) {
                error!("Failed to read detail page of item {}: {:#}", item.id, e);
            }
            item.link = Some(page);
        }
        None => {
            let fragments = dom::text_fragments(&cells[1]);
            if fragments.len() < 5 {
                return Err(FatalError::format(format!(
                    "inline agenda item {:?} has {} text fragments, at least 5 expected",
                    item.id,
                    fragments.len()
                ))
                .into());
            }
            item.name = collapse_whitespace(&dom::leading_text(&cells[1]));
            item.presenter = non_empty(collapse_whitespace(&fragments[3]).replace(": ", ""));
        }
    }
    trace!("Agenda item {}: {:?} ({} attachments)", item.id, item.name, item.attachments.len());
    Ok(item)
}

/// Fills presenter, processor, rationale, resolution and attachments from
/// an item's detail page.
pub fn parse_detail_page(item: &mut AgendaItem, page: &Path) -> Result<()> {
    let dom = dom::load(page)?;
    let root = &dom.document;

    item.presenter = labelled_value(root, |n| dom::is_tag_with_class(n, "td", PRESENTER_LABEL_CLASS))
        .map(|v| collapse_whitespace(&dom::leading_text(&v)))
        .and_then(non_empty);
    item.processor = labelled_value(root, |n| dom::is_tag(n, "td") && dom::has_direct_text(n, PROCESSOR_LABEL))
        .map(|v| collapse_whitespace(&dom::leading_text(&v)))
        .and_then(non_empty);
    item.reason_text = labelled_value(root, |n| dom::is_tag(n, "td") && dom::has_direct_text(n, RATIONALE_LABEL))
        .map(|v| collapse_whitespace(&dom::text_fragments(&v).join("<br/> ")))
        .and_then(non_empty);
    item.resolution = resolution_text(root);

    let base = page.parent().unwrap_or(Path::new("."));
    if let Some(list) = labelled_value(root, |n| dom::is_tag(n, "td") && dom::has_direct_text(n, ATTACHMENTS_LABEL)) {
        for a in dom::element_children(&list).iter().filter(|c| dom::is_tag(c, "a")) {
            let Some(href) = dom::attr(a, "href") else {
                continue;
            };
            let name = collapse_whitespace(&dom::all_text(a));
            item.attachments.push(Attachment::new(name, normalize_path(&base.join(href))));
        }
    }
    Ok(())
}

/// The single element sibling of the single element matching `label`.
fn labelled_value(root: &Handle, label: impl Fn(&Handle) -> bool) -> Option<Handle> {
    let labels = dom::find_all(root, label);
    let [label] = labels.as_slice() else {
        return None;
    };
    let siblings = dom::following_siblings(label);
    match siblings.as_slice() {
        [value] => Some(value.clone()),
        _ => None,
    }
}

fn resolution_text(root: &Handle) -> Option<String> {
    let anchors = dom::find_all(root, |n| dom::is_tag_with_class(n, "div", RESOLUTION_CLASS));
    let [anchor] = anchors.as_slice() else {
        return None;
    };
    let text = dom::following_siblings(anchor)
        .iter()
        .filter(|s| dom::is_tag(s, "div"))
        .map(|s| collapse_whitespace(&dom::text_fragments(s).join(" ")))
        .collect::<Vec<_>>()
        .join(" ");
    non_empty(text.trim().to_string())
}

fn table_rows(table: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    for child in dom::element_children(table) {
        if dom::is_tag(&child, "tr") {
            rows.push(child);
        } else if ["tbody", "thead", "tfoot"].iter().any(|t| dom::is_tag(&child, t)) {
            rows.extend(dom::element_children(&child).into_iter().filter(|r| dom::is_tag(r, "tr")));
        }
    }
    rows
}

fn row_cells(row: &Handle) -> Vec<Handle> {
    dom::element_children(row)
        .into_iter()
        .filter(|c| dom::is_tag(c, "td") || dom::is_tag(c, "th"))
        .collect()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Resolves `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const INDEX: &str = r#"<html><body>
<table class="hlavicka">
  <tr><td>Město</td><td>logo</td><td>Program</td></tr>
  <tr><td>Program jednání</td><td>9. zasedání Zastupitelstva města</td></tr>
  <tr><td>čtvrtek 12. 10. 2023 od 16:00</td><td>Velký sál</td></tr>
</table>
<table class="program">
  <tr class="popisek"><td>Bod</td><td class="left">Název</td></tr>
  <tr><td>1.</td><td class="left">Zahájení<br><span>Předkládá</span><br><span>: starosta</span><br>konec</td></tr>
  <tr><td>2.</td><td class="left"><a href="html/bod2.html">Rozpočet   2024</a></td></tr>
</table>
</body></html>"#;

    const DETAIL: &str = r#"<html><body>
<table class="akteri">
  <tr><td class="predkladatelLabel">Předkládá:</td><td>Jan Novák</td></tr>
  <tr><td>Zpracovatel:</td><td>Odbor financí</td></tr>
  <tr><td>Text důvodové zprávy:</td><td>První odstavec<br>Druhý</td></tr>
  <tr><td>Materiál obsahuje:</td><td><a href="../prilohy/navrh.DOCX">Návrh</a><br><a href="./mapa.png">Mapa</a></td></tr>
</table>
<div class="obal"><div class="prohlaseni">Návrh usnesení:</div><div>Zastupitelstvo schvaluje</div><div>rozpočet.</div></div>
</body></html>"#;

    fn export() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), INDEX).unwrap();
        fs::create_dir(dir.path().join("html")).unwrap();
        fs::write(dir.path().join("html/bod2.html"), DETAIL).unwrap();
        dir
    }

    #[test]
    fn header_cells_are_mapped() {
        let dir = export();
        let programme = parse_programme(dir.path()).unwrap();
        assert_eq!(programme.header.title, "Program jednání");
        assert_eq!(programme.header.designator, "9. zasedání Zastupitelstva města");
        assert_eq!(programme.header.time, "čtvrtek 12. 10. 2023 od 16:00");
        assert_eq!(programme.header.location, "Velký sál");
    }

    #[test]
    fn inline_and_linked_items_are_parsed() {
        let dir = export();
        let items = parse_programme(dir.path()).unwrap().items;
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].id, "1");
        assert_eq!(items[0].name, "Zahájení");
        assert_eq!(items[0].presenter.as_deref(), Some("starosta"));
        assert!(items[0].is_inline());

        let linked = &items[1];
        assert_eq!(linked.name, "Rozpočet 2024");
        assert_eq!(linked.link.as_deref(), Some(dir.path().join("html/bod2.html").as_path()));
        assert_eq!(linked.presenter.as_deref(), Some("Jan Novák"));
        assert_eq!(linked.processor.as_deref(), Some("Odbor financí"));
        assert_eq!(linked.reason_text.as_deref(), Some("První odstavec<br/> Druhý"));
        assert_eq!(linked.resolution.as_deref(), Some("Zastupitelstvo schvaluje rozpočet."));

        let names: Vec<&str> = linked.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Návrh", "Mapa"]);
        assert_eq!(linked.attachments[0].extension, "docx");
        assert_eq!(linked.attachments[0].files.primary(), Some(dir.path().join("prilohy/navrh.DOCX").as_path()));
        assert_eq!(linked.attachments[1].files.primary(), Some(dir.path().join("html/mapa.png").as_path()));
    }

    #[test]
    fn short_header_is_a_format_error() {
        let doc = dom::parse(r#"<table class="hlavicka"><tr><td>a</td><td>b</td></tr></table>"#);
        assert!(matches!(parse_header(&doc.document), Err(FatalError::WrongProgrammeFormat(_))));
    }

    #[test]
    fn odd_rows_are_format_errors() {
        let doc = dom::parse(
            r#"<table class="program"><tr><td>h</td></tr><tr><td>1</td><td>a</td><td>b</td></tr></table>"#,
        );
        let err = parse_items(&doc.document, Path::new(".")).unwrap_err();
        assert!(err.downcast_ref::<FatalError>().is_some());
    }

    #[test]
    fn paths_are_normalized_lexically() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d.pdf")), PathBuf::from("/a/c/d.pdf"));
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }
}
