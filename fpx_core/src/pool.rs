use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::block::DataBlock;
use crate::error::AllocationError;

/// Hands out [`DataBlock`]s and takes them back for reuse.
///
/// `acquire` prefers a free block that already has the requested capacity,
/// then any free block (resized to fit), and only allocates when the free
/// list is empty. The pool is the only caller of `DataBlock::resize`.
pub struct DataBlockPool {
    name: String,
    inner: Mutex<PoolInner>,
    stats: PoolStats,
}

#[derive(Default)]
struct PoolInner {
    free: Vec<DataBlock>,
    total_blocks: usize,
}

/// Lock-free reuse counters.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Acquisitions served from the free list.
    pub hits: AtomicU64,
    /// Acquisitions that had to allocate a new block.
    pub misses: AtomicU64,
    /// Reused blocks that had to be reallocated to a new capacity.
    pub resizes: AtomicU64,
}

impl PoolStats {
    /// Hit rate as a percentage (0.0–100.0).
    pub fn hit_rate(&self) -> f64 {
        let h = self.hits.load(Ordering::Relaxed) as f64;
        let m = self.misses.load(Ordering::Relaxed) as f64;
        let total = h + m;
        if total == 0.0 {
            0.0
        } else {
            (h / total) * 100.0
        }
    }
}

impl DataBlockPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(PoolInner::default()),
            stats: PoolStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take a block of exactly `capacity` bytes.
    pub fn acquire(&self, capacity: usize) -> Result<DataBlock, AllocationError> {
        let mut inner = self.inner.lock();
        let reuse = inner
            .free
            .iter()
            .position(|b| b.size() == capacity)
            .or_else(|| inner.free.len().checked_sub(1));

        if let Some(pos) = reuse {
            let mut block = inner.free.swap_remove(pos);
            if block.size() != capacity {
                if let Err(e) = block.resize(capacity) {
                    // the block is untouched by a failed resize; keep it pooled
                    inner.free.push(block);
                    return Err(e);
                }
                self.stats.resizes.fetch_add(1, Ordering::Relaxed);
            }
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            trace!(pool = %self.name, index = block.index(), capacity, "reused data block");
            return Ok(block);
        }
        drop(inner);

        let block = DataBlock::new(capacity)?;
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().total_blocks += 1;
        debug!(pool = %self.name, index = block.index(), capacity, "pool grew by one block");
        Ok(block)
    }

    /// Return a block to the free list.
    pub fn release(&self, block: DataBlock) {
        trace!(pool = %self.name, index = block.index(), "released data block");
        self.inner.lock().free.push(block);
    }

    /// Blocks ever allocated by this pool.
    pub fn total_blocks(&self) -> usize {
        self.inner.lock().total_blocks
    }

    /// Blocks currently waiting on the free list.
    pub fn free_blocks(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Bytes held by blocks on the free list.
    pub fn free_bytes(&self) -> usize {
        self.inner.lock().free.iter().map(DataBlock::size).sum()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_then_acquire_reuses_block() {
        let pool = DataBlockPool::new("test");
        let block = pool.acquire(256).unwrap();
        let index = block.index();
        pool.release(block);
        assert_eq!(pool.free_blocks(), 1);

        let again = pool.acquire(256).unwrap();
        assert_eq!(again.index(), index);
        assert_eq!(pool.total_blocks(), 1);
        assert_eq!(pool.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(pool.stats().misses.load(Ordering::Relaxed), 1);
        assert_eq!(pool.stats().resizes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn mismatched_capacity_is_resized_not_reallocated_as_new_block() {
        let pool = DataBlockPool::new("test");
        let block = pool.acquire(100).unwrap();
        let index = block.index();
        pool.release(block);

        let resized = pool.acquire(4000).unwrap();
        assert_eq!(resized.index(), index);
        assert_eq!(resized.size(), 4000);
        assert_eq!(pool.stats().resizes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn exact_fit_is_preferred() {
        let pool = DataBlockPool::new("test");
        let small = pool.acquire(10).unwrap();
        let large = pool.acquire(1000).unwrap();
        let large_index = large.index();
        pool.release(large);
        pool.release(small);

        let got = pool.acquire(1000).unwrap();
        assert_eq!(got.index(), large_index);
        assert_eq!(pool.free_bytes(), 10);
    }

    #[test]
    fn failed_resize_keeps_block_pooled() {
        let pool = DataBlockPool::new("test");
        pool.release(pool.acquire(8).unwrap());
        assert!(pool.acquire(usize::MAX).is_err());
        assert_eq!(pool.free_blocks(), 1);
        assert_eq!(pool.free_bytes(), 8);
    }

    #[test]
    fn hit_rate_is_zero_before_use() {
        let pool = DataBlockPool::new("test");
        assert_eq!(pool.stats().hit_rate(), 0.0);
        pool.release(pool.acquire(1).unwrap());
        pool.release(pool.acquire(1).unwrap());
        assert_eq!(pool.stats().hit_rate(), 50.0);
    }
}
