//! Page claiming and per-worker bump allocation.
//!
//! The only state builder workers share is [`PageClaim`], an atomic counter
//! handing out page indices. Each worker owns a [`PageAllocator`], fills its
//! current page front to back, and claims a fresh index once a run does not
//! fit. Pages are sealed into immutable boxed slices when the worker moves
//! on, and assembled into a store once all workers are done.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::storage::paged::{logical_offset, PAGE_SIZE};
use crate::{Error, Result};

/// Hands out page indices. Index 0 is the empty sentinel and never claimed.
#[derive(Debug)]
pub struct PageClaim {
    next_page: AtomicUsize,
}

impl Default for PageClaim {
    fn default() -> Self {
        Self::new()
    }
}

impl PageClaim {
    pub fn new() -> Self {
        Self { next_page: AtomicUsize::new(1) }
    }

    #[inline]
    pub fn claim(&self) -> usize {
        self.next_page.fetch_add(1, Ordering::Relaxed)
    }

    /// Page slots needed to hold every claimed index, sentinel included.
    pub fn page_count(&self) -> usize {
        self.next_page.load(Ordering::Acquire)
    }
}

/// Where a run was placed and the bytes to fill.
#[derive(Debug)]
pub struct WriteHandle<'p> {
    pub offset: u64,
    pub bytes: &'p mut [u8],
}

/// One worker's bump allocator.
#[derive(Debug)]
pub struct PageAllocator<'c> {
    claim: &'c PageClaim,
    current: Option<(usize, Vec<u8>)>,
    sealed: Vec<(usize, Box<[u8]>)>,
}

impl<'c> PageAllocator<'c> {
    pub fn new(claim: &'c PageClaim) -> Self {
        Self { claim, current: None, sealed: Vec::new() }
    }

    /// Reserve `len` contiguous bytes inside a single page.
    ///
    /// Runs longer than a page get a dedicated page of exactly `len` bytes.
    pub fn allocate(&mut self, len: usize) -> Result<WriteHandle<'_>> {
        if len > PAGE_SIZE {
            let index = self.claim.claim();
            let mut page = Vec::new();
            page.try_reserve_exact(len)?;
            page.resize(len, 0);
            tracing::trace!(page = index, len, "builder.page.oversized");
            let slot = self.sealed.len();
            self.sealed.push((index, page.into_boxed_slice()));
            let (_, page) = &mut self.sealed[slot];
            return Ok(WriteHandle { offset: logical_offset(index, 0), bytes: &mut page[..] });
        }

        let fits = matches!(&self.current, Some((_, page)) if page.len() + len <= PAGE_SIZE);
        if !fits {
            self.seal_current();
            let index = self.claim.claim();
            let mut page = Vec::new();
            page.try_reserve_exact(PAGE_SIZE)?;
            tracing::trace!(page = index, "builder.page.claimed");
            self.current = Some((index, page));
        }

        match self.current.as_mut() {
            Some((index, page)) => {
                let start = page.len();
                page.resize(start + len, 0);
                Ok(WriteHandle { offset: logical_offset(*index, start), bytes: &mut page[start..] })
            }
            None => Err(Error::ResourceExhausted("no page available".into())),
        }
    }

    fn seal_current(&mut self) {
        if let Some((index, page)) = self.current.take() {
            self.sealed.push((index, page.into_boxed_slice()));
        }
    }

    /// Seal the open page and hand back every page this worker filled.
    pub fn finish(mut self) -> Vec<(usize, Box<[u8]>)> {
        self.seal_current();
        self.sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::paged::{index_in_page, page_index};

    #[test]
    fn test_claims_start_after_sentinel() {
        let claim = PageClaim::new();
        assert_eq!(claim.page_count(), 1);
        assert_eq!(claim.claim(), 1);
        assert_eq!(claim.claim(), 2);
        assert_eq!(claim.page_count(), 3);
    }

    #[test]
    fn test_bump_allocation_within_page() {
        let claim = PageClaim::new();
        let mut allocator = PageAllocator::new(&claim);
        let first = allocator.allocate(10).unwrap().offset;
        let second = allocator.allocate(20).unwrap().offset;
        assert_eq!(page_index(first), 1);
        assert_eq!(index_in_page(first), 0);
        assert_eq!(second, first + 10);
        let pages = allocator.finish();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].1.len(), 30);
    }

    #[test]
    fn test_run_never_spans_pages() {
        let claim = PageClaim::new();
        let mut allocator = PageAllocator::new(&claim);
        allocator.allocate(PAGE_SIZE - 5).unwrap();
        let next = allocator.allocate(6).unwrap().offset;
        assert_eq!(page_index(next), 2);
        assert_eq!(index_in_page(next), 0);
    }

    #[test]
    fn test_oversized_run_gets_dedicated_page() {
        let claim = PageClaim::new();
        let mut allocator = PageAllocator::new(&claim);
        allocator.allocate(8).unwrap();
        let handle = allocator.allocate(PAGE_SIZE + 1).unwrap();
        assert_eq!(handle.bytes.len(), PAGE_SIZE + 1);
        let big = handle.offset;
        let after = allocator.allocate(8).unwrap().offset;
        assert_eq!(index_in_page(big), 0);
        assert_eq!(page_index(after), 1, "regular page keeps filling");
        let mut pages = allocator.finish();
        pages.sort_by_key(|(index, _)| *index);
        assert_eq!(pages[1].1.len(), PAGE_SIZE + 1);
    }

    #[test]
    fn test_workers_never_share_pages() {
        let claim = PageClaim::new();
        let mut a = PageAllocator::new(&claim);
        let mut b = PageAllocator::new(&claim);
        let from_a = a.allocate(4).unwrap().offset;
        let from_b = b.allocate(4).unwrap().offset;
        assert_ne!(page_index(from_a), page_index(from_b));
    }
}
