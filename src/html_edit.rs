//! Prepares the HTML pages for printing: item detail pages get the voting
//! tally, the notes block, the ordinal and two anchors; the index page gets
//! a link in every agenda row that has none.

use crate::dom::{self, Handle};
use crate::model::{AgendaItem, MeetingHeader};
use crate::text::escape_html;
use anyhow::{Context, Result, anyhow};
use log::{error, trace, warn};
use std::path::{self, Path};
use url::Url;

pub const VOTING_MARKUP: &str = concat!(
    r#"<table class="podpisy"><tr><td>Hlasování:</td><td>Pro ____ </td><td>Proti ____ </td>"#,
    r#"<td>Zdržel se: ____ </td><td>Nehlasoval: ____ </td></tr></table>"#,
    r#"<table class="podpisy"><tr><td width="30%">Usnesení přijato:</td><td width="20%">&#9634; ANO</td>"#,
    r#"<td width="20%">&#9634; NE</td><td width="30%">&#9634; Staženo</td></tr></table>"#,
    r#"<hr class="cela">"#,
);

pub const NOTES_MARKUP: &str = concat!(
    r#"<table cellspacing="10" class="akteri"><tr><td style="vertical-align:top;color: blue;">Pozn&aacute;mky:</td>"#,
    r#"<td><br><br><br></td></tr></table>"#,
);

const STRIPPED_ATTRIBUTES: [&str; 5] = ["style", "font", "face", "size", "color"];
const ATTACHMENTS_LABEL: &str = "Materiál obsahuje:";

/// Anchor name of an item's first page.
pub fn item_anchor(id: &str) -> String {
    format!("pitem_{}", id)
}

/// Edits the detail page `source` of `item` and writes it to `target`.
/// Relative references keep resolving against `base_dir`.
pub fn edit_item_page(item: &AgendaItem, source: &Path, base_dir: &Path, target: &Path) -> Result<()> {
    let dom = dom::load(source)?;
    apply_item_edits(&dom.document, &item.id);
    set_base(&dom.document, base_dir)?;
    dom::save(&dom, target)?;
    trace!("Edited page of item {} written to {:?}", item.id, target);
    Ok(())
}

/// Renders the page of an item that has no detail page and writes the
/// edited result to `target`.
pub fn write_inline_item(item: &AgendaItem, header: &MeetingHeader, target: &Path) -> Result<()> {
    let dom = dom::parse(&render_inline_item(item, header));
    apply_item_edits(&dom.document, &item.id);
    dom::save(&dom, target)?;
    trace!("Page of inline item {} written to {:?}", item.id, target);
    Ok(())
}

/// Page template for inline items, laid out like a VERA detail page.
pub fn render_inline_item(item: &AgendaItem, header: &MeetingHeader) -> String {
    let presenter = item
        .presenter
        .as_deref()
        .map(|p| format!(r#"<tr><td class="predkladatelLabel">Předkládá:</td><td>{}</td></tr>"#, escape_html(p)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="cs">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>body {{ font-family: "Times New Roman", serif; }} .nadpis {{ font-size: 1.4em; font-weight: bold; margin: 1em 0; }}</style>
</head>
<body>
<div class="hlavicka">{designator}<br>{title}<br>{time}</div>
<div id="content">
<div class="nadpis">{name}</div>
<table cellspacing="10" class="akteri">{presenter}</table>
<table class="podpisy"></table>
</div>
</body>
</html>
"#,
        designator = escape_html(&header.designator),
        title = escape_html(&header.title),
        time = escape_html(&header.time),
        name = escape_html(&item.name),
        presenter = presenter,
    )
}

/// Applies the item page edits in place.
pub fn apply_item_edits(document: &Handle, id: &str) {
    match dom::find(document, |n| dom::is_tag_with_class(n, "table", "podpisy")) {
        Some(signatures) => dom::replace(&signatures, dom::fragment(VOTING_MARKUP)),
        None => error!("Table class podpisy not found in item {}", id),
    }

    match dom::find_all(document, |n| dom::is_tag_with_class(n, "hr", "cela")).last() {
        Some(rule) => dom::insert_after(rule, dom::fragment(NOTES_MARKUP)),
        None => warn!("No closing rule in item {}, notes block skipped", id),
    }

    match dom::find(document, |n| dom::is_tag_with_class(n, "div", "nadpis")) {
        Some(title) => dom::prepend_children(&title, dom::fragment(&format!("{}. ", escape_html(id)))),
        None => warn!("No title in item {}", id),
    }

    let anchor = dom::fragment(&format!(r#"<div id="{}"></div>"#, escape_html(&item_anchor(id))));
    if let Some(content) = dom::find(document, |n| dom::is_tag(n, "div") && dom::attr(n, "id").as_deref() == Some("content")) {
        dom::insert_before(&content, anchor);
    } else if let Some(body) = dom::find(document, |n| dom::is_tag(n, "body")) {
        dom::prepend_children(&body, anchor);
    }

    let label = dom::find_all(document, |n| dom::is_tag_with_class(n, "table", "akteri"))
        .iter()
        .flat_map(dom::descendants)
        .find(|n| dom::text_of(n).is_some_and(|t| t.trim() == ATTACHMENTS_LABEL));
    match label {
        Some(label) => dom::insert_after(
            &label,
            dom::fragment(&format!(r#"<div id="{}_attachments"></div>"#, escape_html(&item_anchor(id)))),
        ),
        None => trace!("Item {} lists no attachments, no attachment anchor", id),
    }

    dom::remove_attributes(document, &STRIPPED_ATTRIBUTES);
}

/// Edits the programme index and writes it to `target`. Returns the number
/// of links added.
pub fn edit_index_page(source: &Path, base_dir: &Path, target: &Path) -> Result<usize> {
    let dom = dom::load(source)?;
    let added = link_index_rows(&dom.document);
    dom::remove_attributes(&dom.document, &STRIPPED_ATTRIBUTES);
    set_base(&dom.document, base_dir)?;
    dom::save(&dom, target)?;
    trace!("Edited index written to {:?}, {} links added", target, added);
    Ok(added)
}

/// Wraps the first content of every unlinked `td.left` after `tr.popisek`
/// (the caption cell itself excluded) in a link to the item page.
fn link_index_rows(document: &Handle) -> usize {
    let nodes = dom::descendants(document);
    let Some(start) = nodes.iter().position(|n| dom::is_tag_with_class(n, "tr", "popisek")) else {
        warn!("No tr.popisek in the index, no links added");
        return 0;
    };
    let cells: Vec<&Handle> = nodes[start..]
        .iter()
        .filter(|n| dom::is_tag_with_class(n, "td", "left"))
        .collect();

    let mut added = 0;
    for (i, cell) in cells.into_iter().enumerate().skip(1) {
        if dom::find(cell, |n| dom::is_tag(n, "a")).is_some() {
            continue;
        }
        let Some(first) = cell.children.borrow().first().cloned() else {
            continue;
        };
        let Some(link) = dom::fragment(&format!(r#"<a href="html/pitem_{}.html"></a>"#, i)).pop() else {
            continue;
        };
        dom::replace(&first, vec![link.clone()]);
        dom::append_children(&link, vec![first]);
        added += 1;
    }
    added
}

fn set_base(document: &Handle, base_dir: &Path) -> Result<()> {
    let Some(head) = dom::find(document, |n| dom::is_tag(n, "head")) else {
        return Ok(());
    };
    for old in dom::find_all(&head, |n| dom::is_tag(n, "base")) {
        dom::detach(&old);
    }
    let markup = format!(r#"<base href="{}">"#, escape_html(&file_url(base_dir)?));
    dom::prepend_children(&head, dom::fragment(&markup));
    Ok(())
}

/// `file://` URL of a directory, with a trailing slash. Relative paths are
/// resolved against the working directory.
pub fn file_url(dir: &Path) -> Result<String> {
    let dir = path::absolute(dir).with_context(|| format!("Failed to resolve {:?}", dir))?;
    let url = Url::from_directory_path(&dir).map_err(|()| anyhow!("{:?} has no file URL", dir))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const DETAIL: &str = r#"<html><head><title>Bod</title></head><body>
<div id="content">
<div class="nadpis" style="color: red">Rozpočet</div>
<table class="akteri"><tr><td>Materiál obsahuje:</td><td><a href="a.pdf">Příloha</a></td></tr></table>
<table class="podpisy"><tr><td>podpis</td></tr></table>
</div>
</body></html>"#;

    fn edited(html: &str, id: &str) -> String {
        let dom = dom::parse(html);
        apply_item_edits(&dom.document, id);
        dom::serialize_document(&dom).unwrap()
    }

    #[test]
    fn item_page_gets_voting_notes_and_anchors() {
        let html = edited(DETAIL, "7");
        assert!(html.contains("Hlasování:"));
        assert!(html.contains("Usnesení přijato:"));
        assert!(!html.contains("podpis<"));
        assert!(html.contains("Poznámky:"));
        assert!(html.contains(r#"<div class="nadpis">7. Rozpočet</div>"#));
        assert!(html.contains(r#"<div id="pitem_7"></div><div id="content">"#));
        assert!(html.contains(r#"Materiál obsahuje:<div id="pitem_7_attachments"></div>"#));
        assert!(!html.contains("style="));
    }

    #[test]
    fn notes_follow_the_last_rule() {
        let html = edited(DETAIL, "1");
        let rule = html.rfind(r#"<hr class="cela">"#).unwrap();
        let notes = html.find("Poznámky:").unwrap();
        assert!(rule < notes);
    }

    #[test]
    fn inline_items_render_like_detail_pages() {
        let header = MeetingHeader { designator: "Rada města".into(), ..MeetingHeader::default() };
        let item = AgendaItem {
            id: "3".into(),
            name: "Různé <a>".into(),
            presenter: Some("starosta".into()),
            ..AgendaItem::default()
        };
        let dir = tempdir().unwrap();
        let target = dir.path().join("pitem_3.html");
        write_inline_item(&item, &header, &target).unwrap();
        let html = fs::read_to_string(&target).unwrap();
        assert!(html.contains("3. Různé &lt;a&gt;"));
        assert!(html.contains(r#"<div id="pitem_3">"#));
        assert!(html.contains("starosta"));
        assert!(html.contains("Hlasování:"));
    }

    #[test]
    fn unlinked_index_rows_get_links() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("index.html");
        fs::write(
            &source,
            r#"<html><head></head><body><table class="program">
<tr class="popisek"><td>Bod</td><td class="left">Název</td></tr>
<tr><td>1.</td><td class="left">Zahájení<br>Předkládá: starosta</td></tr>
<tr><td>2.</td><td class="left"><a href="html/bod2.html">Rozpočet</a></td></tr>
<tr><td>3.</td><td class="left" style="color: red">Různé</td></tr>
</table></body></html>"#,
        )
        .unwrap();
        let target = dir.path().join("out.html");
        assert_eq!(edit_index_page(&source, dir.path(), &target).unwrap(), 2);
        let html = fs::read_to_string(&target).unwrap();
        assert!(html.contains(r#"<a href="html/pitem_1.html">Zahájení</a>"#));
        assert!(html.contains(r#"<a href="html/bod2.html">Rozpočet</a>"#));
        assert!(html.contains(r#"<a href="html/pitem_3.html">Různé</a>"#));
        assert!(html.contains("<base href=\"file://"));
    }

    #[test]
    #[cfg(unix)]
    fn file_urls_are_percent_encoded() {
        assert_eq!(
            file_url(Path::new("/data/zasedání 9")).unwrap(),
            "file:///data/zased%C3%A1n%C3%AD%209/"
        );
        assert_eq!(file_url(Path::new("/data/#1/")).unwrap(), "file:///data/%231/");
    }

    #[test]
    fn relative_dirs_resolve_against_the_working_dir() {
        let url = file_url(Path::new("ejednani")).unwrap();
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("/ejednani/"));
    }
}
