//! # Adjacency Cursors
//!
//! Lazy decoders over one node's adjacency run. A cursor never materializes
//! the neighbor list; it decodes one vlong delta at a time and keeps a
//! running base.
//!
//! [`AdjacencyCursor`] is the contract algorithms program against. The
//! merge-join primitives `skip_until` (first value `> x`) and `advance`
//! (first value `>= x`) return `None` when the cursor runs dry before a
//! qualifying value shows up, so exhaustion can never be mistaken for a
//! found value.
//!
//! A cursor is single-threaded. Forking one mid-scan is `copy_state_from`,
//! which copies a small value-type state and never touches the source.

use super::varint::decode_vlong;

/// Lazy, forkable decoder over a sorted neighbor list.
pub trait AdjacencyCursor: Iterator<Item = u64> {
    /// Targets left to decode.
    ///
    /// Exact for a single compressed run; an upper bound for cursors that
    /// filter their input.
    fn remaining(&self) -> u32;

    fn has_next(&self) -> bool {
        self.remaining() > 0
    }

    /// The next target without consuming it.
    fn peek(&self) -> Option<u64>;

    /// Consume targets `<= target`; return the first one `> target`.
    fn skip_until(&mut self, target: u64) -> Option<u64> {
        while let Some(next) = self.next() {
            if next > target {
                return Some(next);
            }
        }
        None
    }

    /// Consume targets `< target`; return the first one `>= target`.
    fn advance(&mut self, target: u64) -> Option<u64> {
        while let Some(next) = self.next() {
            if next >= target {
                return Some(next);
            }
        }
        None
    }

    /// Take over the decode position of `other` without mutating it.
    fn copy_state_from(&mut self, other: &Self)
    where
        Self: Sized;
}

// ============================================================================
// CompressedCursor
// ============================================================================

/// Decode position inside a run: a plain value, cheap to copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    /// Byte position of the next vlong, relative to the run body.
    pub position: usize,
    /// Last decoded absolute target (the delta base).
    pub last_target: u64,
    /// Targets left to decode.
    pub remaining: u32,
}

/// Cursor over a `[degree][vlong deltas…]` run in a paged byte store.
#[derive(Debug, Clone, Copy)]
pub struct CompressedCursor<'a> {
    body: &'a [u8],
    degree: u32,
    state: CursorState,
}

impl<'a> CompressedCursor<'a> {
    /// `body` starts right after the degree header.
    pub(crate) fn new(body: &'a [u8], degree: u32) -> Self {
        Self {
            body,
            degree,
            state: CursorState { position: 0, last_target: 0, remaining: degree },
        }
    }

    /// A cursor over no targets, for nodes without a run.
    pub fn empty() -> Self {
        Self::new(&[], 0)
    }

    /// Degree this run was encoded with.
    pub fn degree(&self) -> u32 {
        self.degree
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Decode the next target. The caller must have checked `has_next`.
    #[inline]
    pub fn next_vlong(&mut self) -> u64 {
        debug_assert!(self.state.remaining > 0, "decoded past the end of an adjacency run");
        let delta = decode_vlong(self.body, &mut self.state.position);
        self.state.last_target += delta;
        self.state.remaining -= 1;
        self.state.last_target
    }
}

impl Iterator for CompressedCursor<'_> {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        if self.state.remaining == 0 {
            return None;
        }
        Some(self.next_vlong())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.state.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CompressedCursor<'_> {}

impl AdjacencyCursor for CompressedCursor<'_> {
    #[inline]
    fn remaining(&self) -> u32 {
        self.state.remaining
    }

    fn peek(&self) -> Option<u64> {
        if self.state.remaining == 0 {
            return None;
        }
        let mut position = self.state.position;
        Some(self.state.last_target + decode_vlong(self.body, &mut position))
    }

    #[inline]
    fn skip_until(&mut self, target: u64) -> Option<u64> {
        while self.state.remaining > 0 {
            let next = self.next_vlong();
            if next > target {
                return Some(next);
            }
        }
        None
    }

    #[inline]
    fn advance(&mut self, target: u64) -> Option<u64> {
        while self.state.remaining > 0 {
            let next = self.next_vlong();
            if next >= target {
                return Some(next);
            }
        }
        None
    }

    fn copy_state_from(&mut self, other: &Self) {
        self.body = other.body;
        self.degree = other.degree;
        self.state = other.state;
    }
}

// ============================================================================
// PropertyCursor
// ============================================================================

/// Cursor over a property run: one little-endian `f64` per target, in the
/// same order as the adjacency run. No delta coding.
#[derive(Debug, Clone, Copy)]
pub struct PropertyCursor<'a> {
    bytes: &'a [u8],
    position: usize,
    remaining: u32,
}

impl<'a> PropertyCursor<'a> {
    pub(crate) fn new(bytes: &'a [u8], count: u32) -> Self {
        Self { bytes, position: 0, remaining: count }
    }

    pub fn empty() -> Self {
        Self::new(&[], 0)
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Iterator for PropertyCursor<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[self.position..self.position + 8]);
        self.position += 8;
        self.remaining -= 1;
        Some(f64::from_le_bytes(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PropertyCursor<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::varint::push_vlong;

    fn encode(targets: &[u64]) -> Vec<u8> {
        let mut body = Vec::new();
        let mut last = 0;
        for &t in targets {
            push_vlong(t - last, &mut body);
            last = t;
        }
        body
    }

    #[test]
    fn test_sequential_decode() {
        let body = encode(&[2, 5, 5, 300, 100_000]);
        let mut cursor = CompressedCursor::new(&body, 5);
        assert_eq!(cursor.remaining(), 5);
        assert_eq!(cursor.peek(), Some(2));
        assert_eq!(cursor.next(), Some(2));
        assert_eq!(cursor.next(), Some(5));
        assert_eq!(cursor.next(), Some(5));
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.by_ref().collect::<Vec<_>>(), vec![300, 100_000]);
        assert!(!cursor.has_next());
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.peek(), None);
    }

    #[test]
    fn test_skip_until_is_strict() {
        let body = encode(&[1, 3, 3, 7, 9]);
        let mut cursor = CompressedCursor::new(&body, 5);
        assert_eq!(cursor.skip_until(3), Some(7));
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.skip_until(9), None);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_advance_is_inclusive() {
        let body = encode(&[1, 3, 3, 7, 9]);
        let mut cursor = CompressedCursor::new(&body, 5);
        assert_eq!(cursor.advance(3), Some(3));
        assert_eq!(cursor.advance(3), Some(3));
        assert_eq!(cursor.advance(8), Some(9));
        assert_eq!(cursor.advance(0), None);
    }

    #[test]
    fn test_degree_bounds_decoding() {
        // trailing bytes past the run must never be decoded
        let mut body = encode(&[4, 8]);
        body.extend_from_slice(&[1, 1, 1]);
        let cursor = CompressedCursor::new(&body, 2);
        assert_eq!(cursor.collect::<Vec<_>>(), vec![4, 8]);
    }

    #[test]
    fn test_copy_state_forks_independently() {
        let body = encode(&[10, 20, 30, 40]);
        let mut source = CompressedCursor::new(&body, 4);
        source.next();
        let mut fork = CompressedCursor::empty();
        fork.copy_state_from(&source);
        assert_eq!(fork.state(), source.state());
        assert_eq!(fork.advance(35), Some(40));
        assert_eq!(source.next(), Some(20));
        assert_eq!(source.remaining(), 2);
    }

    #[test]
    fn test_property_cursor() {
        let mut bytes = Vec::new();
        for v in [0.5f64, -1.0, 3.25] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let cursor = PropertyCursor::new(&bytes, 3);
        assert_eq!(cursor.collect::<Vec<_>>(), vec![0.5, -1.0, 3.25]);
        assert_eq!(PropertyCursor::empty().next(), None);
    }
}
