//! Link Rewriter
//!
//! Planning is a pure function of the section lengths and the number of
//! links found on each page; applying a plan resolves page indices to page
//! objects and persists in two incremental revisions (retargets first,
//! then insertions).

use crate::layout::{LengthVector, Placement, clamp_page};
use crate::pdf::PdfDocument;
use crate::pdf::geometry::{PageFrame, Rect};
use crate::pdf::links::{LinkHandle, insert_link, links_on_page, retarget_link};
use anyhow::Result;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::ops::Range;

/// Fixed link rectangles, in A4 visible-page points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSlot {
    /// Top centre of an item's first page, back to the index page.
    IndexBack,
    /// Top right of an item's first page.
    Next,
    /// Top left of an item's first page.
    Previous,
    /// Bottom right of an attachment page, back to the item.
    ItemBack,
}

impl LinkSlot {
    pub fn rect(self, frame: &PageFrame) -> Rect {
        let s = frame.scale();
        let (w, h) = (frame.width(), frame.height());
        match self {
            LinkSlot::IndexBack => Rect::new(200.0 * s, 0.0, 400.0 * s, 128.0 * s),
            LinkSlot::Next => Rect::new(420.0 * s, 0.0, w, 128.0 * s),
            LinkSlot::Previous => Rect::new(0.0, 0.0, 180.0 * s, 128.0 * s),
            LinkSlot::ItemBack => Rect::new(w - 200.0 * s, h - 118.0 * s, w, h),
        }
    }
}

/// One step of a link plan. Pages are absolute indices into the document
/// the plan is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Point the `ordinal`-th existing link on `page` at `target`.
    Retarget { page: usize, ordinal: usize, target: usize },
    Insert { page: usize, slot: LinkSlot, target: usize },
}

/// Plan for the assembled programme laid out after `base` leading pages.
///
/// `index_links[p]` is the number of links on programme page `p`. The
/// `j`-th index link overall goes to item `j`, whose first page receives a
/// link back to the index page holding it.
pub fn plan_programme(lengths: &LengthVector, base: usize, total_pages: usize, index_links: &[usize]) -> Vec<LinkAction> {
    let mut actions = Vec::new();
    if total_pages == 0 {
        return actions;
    }
    let placement = Placement { lengths, base, total_pages };
    let items = lengths.item_count();

    let mut j = 0;
    for (p, &count) in index_links.iter().enumerate().take(lengths.index_pages()) {
        let index_page = placement.index_page(p);
        for ordinal in 0..count {
            let target = placement.item_start(j);
            actions.push(LinkAction::Retarget { page: index_page, ordinal, target });
            if j < items && lengths.lengths()[j + 1] > 0 {
                actions.push(LinkAction::Insert { page: target, slot: LinkSlot::IndexBack, target: index_page });
            }
            j += 1;
        }
    }

    for i in 0..items {
        if lengths.lengths()[i + 1] == 0 {
            continue;
        }
        let first = placement.item_start(i);
        actions.push(LinkAction::Insert { page: first, slot: LinkSlot::Next, target: placement.item_start(i + 1) });
        // Items without pages have no first page to go back to.
        if let Some(previous) = (0..i).rev().find(|&k| lengths.lengths()[k + 1] > 0) {
            actions.push(LinkAction::Insert {
                page: first,
                slot: LinkSlot::Previous,
                target: placement.item_start(previous),
            });
        }
    }
    actions
}

/// Plan for one item document: `item_pages` rendered pages followed by the
/// appended attachments.
///
/// The `k`-th link on the item's own pages goes to the first page of
/// attachment `k`; every attachment page links back to page 0.
pub fn plan_item(item_pages: usize, attachment_pages: &[usize], own_links: &[usize]) -> Vec<LinkAction> {
    let mut actions = Vec::new();
    let total = item_pages + attachment_pages.iter().sum::<usize>();
    if attachment_pages.is_empty() || total == 0 {
        return actions;
    }

    let mut k = 0;
    for (page, &count) in own_links.iter().enumerate().take(item_pages) {
        for ordinal in 0..count {
            let before: usize = attachment_pages[..k.min(attachment_pages.len())].iter().sum();
            let target = clamp_page(item_pages + before, total);
            actions.push(LinkAction::Retarget { page, ordinal, target });
            k += 1;
        }
    }

    for page in item_pages..total {
        actions.push(LinkAction::Insert { page, slot: LinkSlot::ItemBack, target: 0 });
    }
    actions
}

/// Number of links on each page of `pages`.
pub fn count_links(pdf: &PdfDocument, pages: Range<usize>) -> Result<Vec<usize>> {
    let ids = pdf.page_ids();
    pages
        .map(|p| match ids.get(p) {
            Some(&id) => Ok(links_on_page(pdf, id)?.len()),
            None => Ok(0),
        })
        .collect()
}

/// Applies `actions`, saving an incremental revision after the retargets
/// and another after the insertions.
pub fn apply_plan(pdf: &mut PdfDocument, actions: &[LinkAction]) -> Result<()> {
    let pages = pdf.page_ids();
    if pages.is_empty() {
        return Ok(());
    }
    let page_ref = |index: usize| pages[clamp_page(index, pages.len())];

    // Link lists are collected before anything is inserted, so ordinals
    // always refer to the links the page came with.
    let mut existing: BTreeMap<usize, Vec<LinkHandle>> = BTreeMap::new();
    for action in actions {
        if let LinkAction::Retarget { page, .. } = *action {
            if !existing.contains_key(&page) {
                existing.insert(page, links_on_page(pdf, page_ref(page))?);
            }
        }
    }

    let mut retargeted = 0;
    for action in actions {
        if let LinkAction::Retarget { page, ordinal, target } = *action {
            match existing.get(&page).and_then(|links| links.get(ordinal)) {
                Some(&handle) => {
                    retarget_link(pdf, handle, page_ref(target))?;
                    retargeted += 1;
                }
                None => warn!("No link #{} on page {} of {:?}", ordinal, page, pdf.path()),
            }
        }
    }
    pdf.save_incremental()?;

    let mut inserted = 0;
    for action in actions {
        if let LinkAction::Insert { page, slot, target } = *action {
            let page_id = page_ref(page);
            let rect = slot.rect(&pdf.page_frame(page_id)?);
            insert_link(pdf, page_id, rect, page_ref(target))?;
            inserted += 1;
        }
    }
    pdf.save_incremental()?;

    debug!("Linked {:?}: {} links retargeted, {} inserted", pdf.path(), retargeted, inserted);
    Ok(())
}

/// Links the item document at `pdf` to its appended attachments.
pub fn link_item(pdf: &mut PdfDocument, item_pages: usize, attachment_pages: &[usize]) -> Result<()> {
    if attachment_pages.is_empty() {
        return Ok(());
    }
    let own_links = count_links(pdf, 0..item_pages)?;
    apply_plan(pdf, &plan_item(item_pages, attachment_pages, &own_links))
}

/// Links the index to the items and the items to each other, for a
/// programme that starts after `base` leading pages.
pub fn link_programme(pdf: &mut PdfDocument, lengths: &LengthVector, base: usize) -> Result<()> {
    let index_links = count_links(pdf, base..base + lengths.index_pages())?;
    let found: usize = index_links.iter().sum();
    if found != lengths.item_count() {
        warn!(
            "Index has {} links but the programme has {} items, links are matched in order",
            found,
            lengths.item_count()
        );
    }
    let plan = plan_programme(lengths, base, pdf.page_count(), &index_links);
    apply_plan(pdf, &plan)
}
