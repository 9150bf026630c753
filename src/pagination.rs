//! Transaction-history paging
//!
//! Page numbers are 1-based. The server clamps `limit` to 1..=100.

use crate::models::TransactionPage;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One slot of the page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSlot {
    Page(u32),
    Ellipsis,
}

/// ceil(total / limit), 0 when `limit` is 0
pub fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(u64::from(limit)).min(u64::from(u32::MAX)) as u32
}

/// Page selector layout: first, last, and current ± 1, with an ellipsis
/// standing in for each elided run. Empty when there is one page or less.
pub fn page_window(current: u32, total_pages: u32) -> Vec<PageSlot> {
    if total_pages <= 1 {
        return Vec::new();
    }

    let shown = |page: u32| page == 1 || page == total_pages || current.abs_diff(page) <= 1;
    let mut pages = vec![
        1,
        current.saturating_sub(1),
        current,
        current.saturating_add(1),
        total_pages,
    ];
    pages.retain(|p| (1..=total_pages).contains(p));
    pages.sort_unstable();
    pages.dedup();

    let lead_gap = current > 3 && !shown(2);
    let tail_gap = current.saturating_add(2) < total_pages && !shown(total_pages - 1);

    let mut slots = Vec::with_capacity(pages.len() + 2);
    for page in pages {
        if page == total_pages && tail_gap {
            slots.push(PageSlot::Ellipsis);
        }
        slots.push(PageSlot::Page(page));
        if page == 1 && lead_gap {
            slots.push(PageSlot::Ellipsis);
        }
    }
    slots
}

pub fn previous_page(current: u32) -> u32 {
    current.saturating_sub(1).max(1)
}

pub fn next_page(current: u32, total_pages: u32) -> u32 {
    current.saturating_add(1).min(total_pages.max(1))
}

impl TransactionPage {
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.limit)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}
