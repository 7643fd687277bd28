//! Worker pool, cooperative termination and node-range batching.
//!
//! Algorithms parallelize by statically cutting the node range into
//! contiguous batches and running them on a fixed-size rayon pool. The
//! termination flag is checked when a batch starts: in-flight batches
//! finish, no new batch begins.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Error, Result};

/// Worker count used when a config leaves it unset.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Batches per worker; more than one so uneven batches balance out.
const BATCHES_PER_WORKER: u64 = 4;

/// Smallest batch worth scheduling on its own.
const MIN_BATCH_SIZE: u64 = 64;

pub fn validate_concurrency(concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        return Err(Error::InvalidConfiguration("concurrency must be at least 1".into()));
    }
    Ok(())
}

/// Run `task` on a dedicated pool of exactly `concurrency` workers.
pub fn run_in_pool<T, F>(concurrency: usize, task: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    validate_concurrency(concurrency)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .thread_name(|index| format!("gds-worker-{index}"))
        .build()?;
    Ok(pool.install(task))
}

/// Contiguous node-id ranges covering `0..node_count`.
pub fn node_batches(node_count: u64, concurrency: usize) -> Vec<Range<u64>> {
    if node_count == 0 {
        return Vec::new();
    }
    let workers = concurrency.max(1) as u64;
    let batch_size = node_count
        .div_ceil(workers * BATCHES_PER_WORKER)
        .max(MIN_BATCH_SIZE);
    (0..node_count)
        .step_by(batch_size as usize)
        .map(|start| start..(start + batch_size).min(node_count))
        .collect()
}

// ============================================================================
// TerminationFlag
// ============================================================================

/// Cooperative cancellation shared between a caller and running workers.
#[derive(Debug, Clone, Default)]
pub struct TerminationFlag {
    terminated: Arc<AtomicBool>,
}

impl TerminationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    #[inline]
    pub fn running(&self) -> bool {
        !self.terminated.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_cover_range() {
        let batches = node_batches(1_000, 2);
        assert_eq!(batches.first().map(|r| r.start), Some(0));
        assert_eq!(batches.last().map(|r| r.end), Some(1_000));
        for pair in batches.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(node_batches(0, 4).is_empty());
        assert_eq!(node_batches(7, 4), vec![0..7]);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(run_in_pool(0, || ()), Err(Error::InvalidConfiguration(_))));
        assert_eq!(run_in_pool(2, rayon::current_num_threads).unwrap(), 2);
    }

    #[test]
    fn test_termination_flag_is_shared() {
        let flag = TerminationFlag::new();
        let clone = flag.clone();
        assert!(clone.running());
        flag.terminate();
        assert!(!clone.running());
    }
}
