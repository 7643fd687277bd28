//! Paged sparse `u64 → u64` lookup for the external id space.
//!
//! External ids can be far larger than the node count, so only pages that
//! hold at least one id are materialized. Each page covers
//! `2^SPARSE_PAGE_SHIFT` consecutive external ids. Slots store `value + 1`;
//! a zero slot means absent.

use hashbrown::HashMap;

const SPARSE_PAGE_SHIFT: u32 = 12;
const SPARSE_PAGE_SIZE: usize = 1 << SPARSE_PAGE_SHIFT;
const SPARSE_PAGE_MASK: u64 = (SPARSE_PAGE_SIZE as u64) - 1;

#[derive(Debug, Default, Clone)]
pub struct SparseLongArray {
    pages: HashMap<u64, Box<[u64]>>,
    len: usize,
}

impl SparseLongArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `index` to `value`. `value` must be below `u64::MAX`.
    pub fn set(&mut self, index: u64, value: u64) {
        debug_assert!(value < u64::MAX);
        let page = self
            .pages
            .entry(index >> SPARSE_PAGE_SHIFT)
            .or_insert_with(|| vec![0u64; SPARSE_PAGE_SIZE].into_boxed_slice());
        let slot = &mut page[(index & SPARSE_PAGE_MASK) as usize];
        if *slot == 0 {
            self.len += 1;
        }
        *slot = value + 1;
    }

    #[inline]
    pub fn get(&self, index: u64) -> Option<u64> {
        let page = self.pages.get(&(index >> SPARSE_PAGE_SHIFT))?;
        match page[(index & SPARSE_PAGE_MASK) as usize] {
            0 => None,
            stored => Some(stored - 1),
        }
    }

    #[inline]
    pub fn contains(&self, index: u64) -> bool {
        self.get(index).is_some()
    }

    /// Number of mapped indices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.pages.len() * SPARSE_PAGE_SIZE * std::mem::size_of::<u64>()
    }
}
