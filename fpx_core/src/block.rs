use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::error::AllocationError;

/// Process-wide source of block identifiers.
static INDEX_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// One contiguous, reusable allocation backing a frame payload.
///
/// Memory is allocated on construction and kept across reuse, so a block that
/// keeps seeing frames of the same dimensions never touches the allocator
/// again. Asking for a different capacity reallocates: blocks settle at one
/// working size rather than growing geometrically.
///
/// The block owns its storage outright and frees it exactly once, on drop.
/// Changing capacity is reserved for [`DataBlockPool`](crate::DataBlockPool);
/// other holders can only copy data in, which resizes to fit if needed.
#[derive(Debug)]
pub struct DataBlock {
    index: usize,
    storage: Box<[u8]>,
}

impl DataBlock {
    /// Allocate a block of `capacity` bytes and give it the next identifier.
    pub fn new(capacity: usize) -> Result<Self, AllocationError> {
        let storage = allocate(capacity)?;
        let index = INDEX_COUNTER.fetch_add(1, Ordering::Relaxed);
        debug!(index, capacity, "allocated data block");
        Ok(Self { index, storage })
    }

    /// Identifier assigned at construction; unchanged by resizes.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current capacity in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Copy `src` into the start of the block.
    ///
    /// If `src` is larger than the current capacity the block first resizes to
    /// exactly `src.len()` bytes, discarding its previous contents.
    pub fn copy_data(&mut self, src: &[u8]) -> Result<(), AllocationError> {
        if src.len() > self.size() {
            self.resize(src.len())?;
        }
        self.storage[..src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Read access to the whole allocation.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.storage
    }

    /// Reallocate to exactly `nbytes`. No-op if the capacity already matches.
    ///
    /// The replacement is allocated before the old storage is dropped, so on
    /// failure the block still holds its previous allocation.
    pub(crate) fn resize(&mut self, nbytes: usize) -> Result<(), AllocationError> {
        if nbytes == self.size() {
            return Ok(());
        }
        let replacement = allocate(nbytes)?;
        debug!(index = self.index, from = self.size(), to = nbytes, "resizing data block");
        self.storage = replacement;
        Ok(())
    }
}

/// Fallibly allocate a zeroed buffer of exactly `nbytes`.
///
/// Used for short-lived scratch space whose size is not worth pooling.
pub fn scratch_buffer(nbytes: usize) -> Result<Vec<u8>, AllocationError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(nbytes)
        .map_err(|source| AllocationError { requested: nbytes, source })?;
    buf.resize(nbytes, 0);
    Ok(buf)
}

fn allocate(nbytes: usize) -> Result<Box<[u8]>, AllocationError> {
    Ok(scratch_buffer(nbytes)?.into_boxed_slice())
}
