//! Offset table: internal node id → logical offset of its run.

/// Dense per-node offsets. `0` means the node has no run.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyOffsets {
    offsets: Vec<u64>,
}

impl AdjacencyOffsets {
    pub(crate) fn new(offsets: Vec<u64>) -> Self {
        Self { offsets }
    }

    /// Offset of `node`'s run, or 0.
    #[inline]
    pub fn get(&self, node: u64) -> u64 {
        self.offsets[node as usize]
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Bytes held by the table itself.
    pub fn size_in_bytes(&self) -> usize {
        self.offsets.len() * std::mem::size_of::<u64>()
    }
}
