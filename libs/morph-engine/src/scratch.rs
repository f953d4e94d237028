use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

const MAX_POOLED: usize = 32;
const MAX_POOLED_ENTRIES: usize = 256;

/// Per-adaptation bookkeeping, indexed by flattened member position.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    /// Source members resolved by direct matching.
    pub consumed: Vec<bool>,
    /// Destination members written during this adaptation.
    pub set: Vec<bool>,
}

impl Scratch {
    fn prepare(&mut self, source_len: usize, destination_len: usize) {
        self.consumed.clear();
        self.consumed.resize(source_len, false);
        self.set.clear();
        self.set.resize(destination_len, false);
    }

    fn entries(&self) -> usize {
        self.consumed.capacity() + self.set.capacity()
    }
}

/// Small free list of [`Scratch`] objects.
#[derive(Debug, Default)]
pub(crate) struct ScratchPool {
    free: Mutex<Vec<Scratch>>,
}

impl ScratchPool {
    pub(crate) fn acquire(&self, source_len: usize, destination_len: usize) -> PooledScratch<'_> {
        let mut scratch = self.free.lock().pop().unwrap_or_default();
        scratch.prepare(source_len, destination_len);
        PooledScratch { pool: self, scratch }
    }

    fn release(&self, scratch: Scratch) {
        if scratch.entries() > MAX_POOLED_ENTRIES {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < MAX_POOLED {
            free.push(scratch);
        }
    }

    #[cfg(test)]
    fn pooled(&self) -> usize {
        self.free.lock().len()
    }
}

/// Scratch on loan; returns itself to the pool on drop.
pub(crate) struct PooledScratch<'a> {
    pool: &'a ScratchPool,
    scratch: Scratch,
}

impl Deref for PooledScratch<'_> {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        &self.scratch
    }
}

impl DerefMut for PooledScratch<'_> {
    fn deref_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }
}

impl Drop for PooledScratch<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.scratch));
    }
}
