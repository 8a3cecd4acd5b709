//! Length vector and absolute page offsets.
//!
//! Entry 0 is the programme (index) section, entry `k + 1` is agenda item `k`
//! including all of its appended attachments.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LengthVector(Vec<usize>);

impl LengthVector {
    pub fn new(index_pages: usize) -> Self {
        LengthVector(vec![index_pages])
    }

    pub fn from_lengths(lengths: Vec<usize>) -> Self {
        LengthVector(lengths)
    }

    pub fn push(&mut self, pages: usize) {
        self.0.push(pages);
    }

    /// Number of sub-documents (index included).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn index_pages(&self) -> usize {
        self.0.first().copied().unwrap_or(0)
    }

    pub fn lengths(&self) -> &[usize] {
        &self.0
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// `sum(L[..k])`; `k` past the end saturates to the total.
    pub fn offset(&self, k: usize) -> usize {
        self.0[..k.min(self.0.len())].iter().sum()
    }

    /// First page of agenda item `item` (0-based), relative to the programme start.
    pub fn item_start(&self, item: usize) -> usize {
        self.offset(item + 1)
    }
}

/// Clamps a page target into `0..total`. A document without pages only has
/// target 0, callers skip link placement in that case.
pub fn clamp_page(target: usize, total: usize) -> usize {
    if total == 0 { 0 } else { target.min(total - 1) }
}

/// Absolute section boundaries of a programme laid out after `base` pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement<'a> {
    pub lengths: &'a LengthVector,
    pub base: usize,
    pub total_pages: usize,
}

impl Placement<'_> {
    pub fn item_start(&self, item: usize) -> usize {
        clamp_page(self.base + self.lengths.item_start(item), self.total_pages)
    }

    pub fn index_page(&self, page: usize) -> usize {
        clamp_page(self.base + page, self.total_pages)
    }
}
