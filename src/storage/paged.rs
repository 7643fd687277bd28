//! # Paged Byte Store
//!
//! A two-level array: a page table of fixed-size byte pages, addressed by a
//! 64-bit logical offset.
//!
//! ```text
//! logical offset o ──► page  = o >> PAGE_SHIFT
//!                      intra = o &  PAGE_MASK
//! ```
//!
//! Page 0 is a permanently empty sentinel, so no run ever starts at logical
//! offset 0 and the offset table can use 0 for "no adjacency run".
//! A run never spans a page boundary. Runs larger than [`PAGE_SIZE`] live
//! alone in a dedicated page sized exactly to the run.

use super::cursor::{CompressedCursor, PropertyCursor};

/// log2 of the page size.
pub const PAGE_SHIFT: u32 = 18;

/// Bytes per regular page (256 KiB).
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Mask selecting the intra-page part of a logical offset.
pub const PAGE_MASK: u64 = (PAGE_SIZE as u64) - 1;

/// Bytes of the per-run degree header.
pub const DEGREE_HEADER_BYTES: usize = 4;

/// Page index of a logical offset.
#[inline]
pub const fn page_index(offset: u64) -> usize {
    (offset >> PAGE_SHIFT) as usize
}

/// Position inside its page of a logical offset.
#[inline]
pub const fn index_in_page(offset: u64) -> usize {
    (offset & PAGE_MASK) as usize
}

/// Logical offset of `intra` bytes into page `page`.
#[inline]
pub const fn logical_offset(page: usize, intra: usize) -> u64 {
    ((page as u64) << PAGE_SHIFT) | intra as u64
}

/// Sealed, immutable pages.
#[derive(Debug, Default)]
pub struct PagedByteStore {
    pages: Vec<Box<[u8]>>,
    allocated_bytes: usize,
}

impl PagedByteStore {
    /// Assemble a store from `(page index, bytes)` pairs handed back by the
    /// builder's allocators. Indices not present stay empty.
    pub(crate) fn from_pages(page_count: usize, sealed: Vec<(usize, Box<[u8]>)>) -> Self {
        let mut pages: Vec<Box<[u8]>> = Vec::with_capacity(page_count.max(1));
        pages.resize_with(page_count.max(1), Default::default);
        let mut allocated_bytes = 0;
        for (index, page) in sealed {
            debug_assert!(index > 0, "page 0 is reserved");
            debug_assert!(pages[index].is_empty(), "page {index} sealed twice");
            allocated_bytes += page.len();
            pages[index] = page;
        }
        Self { pages, allocated_bytes }
    }

    /// Number of page slots including the sentinel.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Bytes held by all pages.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// The page a run starting at `offset` lives in, from the run start on.
    #[inline]
    fn run(&self, offset: u64) -> &[u8] {
        &self.pages[page_index(offset)][index_in_page(offset)..]
    }

    /// Degree header of the adjacency run at `offset`; 0 for offset 0.
    #[inline]
    pub fn degree(&self, offset: u64) -> u32 {
        if offset == 0 {
            return 0;
        }
        let run = self.run(offset);
        u32::from_le_bytes([run[0], run[1], run[2], run[3]])
    }

    /// Open a cursor on the adjacency run at `offset`.
    pub fn cursor(&self, offset: u64) -> CompressedCursor<'_> {
        if offset == 0 {
            return CompressedCursor::empty();
        }
        let run = self.run(offset);
        let degree = u32::from_le_bytes([run[0], run[1], run[2], run[3]]);
        CompressedCursor::new(&run[DEGREE_HEADER_BYTES..], degree)
    }

    /// Open a cursor on a property run of `count` values at `offset`.
    pub fn property_cursor(&self, offset: u64, count: u32) -> PropertyCursor<'_> {
        if offset == 0 || count == 0 {
            return PropertyCursor::empty();
        }
        PropertyCursor::new(self.run(offset), count)
    }
}
