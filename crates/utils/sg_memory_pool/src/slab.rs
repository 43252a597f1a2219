use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A pool of fixed-size slabs of `T`.
///
/// Slabs are the unit of both allocation and release: a [`SlabArena`] carves exactly-sized
/// sub-slices out of one or more slabs, and returns every slab it touched back to this pool as a
/// whole the moment its owning batch releases (`spec.md` §3, "Pooled types").
pub struct SlabPool<T> {
    slot_count: usize,
    free: Mutex<Vec<Box<[T]>>>,
    allocated_slabs: AtomicU64,
}

impl<T: Default + Clone> SlabPool<T> {
    /// `slot_count` is the number of `T` slots per slab. `spec.md` §9 fixes this at 1000 for
    /// `AggrChunk`: a 24h block at a 5s scrape interval holds roughly 144 chunks per series, so
    /// 1000 comfortably covers several series per slab.
    pub fn new(slot_count: usize) -> Self {
        assert!(slot_count > 0);
        Self {
            slot_count,
            free: Mutex::new(Vec::new()),
            allocated_slabs: AtomicU64::new(0),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Number of slabs currently allocated (free or in use). Used by tests to confirm slab reuse
    /// across successive runs (`spec.md` §8, scenario 5).
    pub fn allocated_slabs(&self) -> u64 {
        self.allocated_slabs.load(Ordering::Relaxed)
    }

    fn acquire_slab(&self) -> Box<[T]> {
        if let Some(slab) = self.free.lock().pop() {
            return slab;
        }
        self.allocated_slabs.fetch_add(1, Ordering::Relaxed);
        vec![T::default(); self.slot_count].into_boxed_slice()
    }

    fn release_slab(&self, mut slab: Box<[T]>) {
        for slot in slab.iter_mut() {
            *slot = T::default();
        }
        self.free.lock().push(slab);
    }
}

/// Address of a carved sub-slice within a [`SlabArena`]: which slab, and the `[start, start+len)`
/// range within it.
#[derive(Debug, Clone, Copy)]
pub struct SlabSlice {
    slab_index: usize,
    start: usize,
    len: usize,
}

impl SlabSlice {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A bump arena bound to a single batch, lazily drawing slabs from a shared [`SlabPool`].
///
/// Non-trivial memory is only touched once a caller actually reserves a sub-slice
/// (`spec.md` §4.1: "non-trivial memory is touched only when the caller actually populates
/// chunks").
pub struct SlabArena<T> {
    pool: Arc<SlabPool<T>>,
    slabs: Vec<Box<[T]>>,
    cursor: usize,
}

impl<T: Default + Clone> SlabArena<T> {
    pub fn new(pool: Arc<SlabPool<T>>) -> Self {
        Self {
            pool,
            slabs: Vec::new(),
            cursor: 0,
        }
    }

    /// Reserves `n` contiguous slots, allocating a fresh slab from the pool if the current one
    /// can't fit the request. A single reservation may never exceed the pool's slot count.
    pub fn reserve(&mut self, n: usize) -> SlabSlice {
        assert!(
            n <= self.pool.slot_count(),
            "cannot carve {n} slots from a {}-slot slab",
            self.pool.slot_count(),
        );

        if self.slabs.is_empty() || self.cursor + n > self.pool.slot_count() {
            self.slabs.push(self.pool.acquire_slab());
            self.cursor = 0;
        }

        let slab_index = self.slabs.len() - 1;
        let start = self.cursor;
        self.cursor += n;
        SlabSlice {
            slab_index,
            start,
            len: n,
        }
    }

    pub fn get(&self, loc: SlabSlice) -> &[T] {
        &self.slabs[loc.slab_index][loc.start..loc.start + loc.len]
    }

    pub fn get_mut(&mut self, loc: SlabSlice) -> &mut [T] {
        &mut self.slabs[loc.slab_index][loc.start..loc.start + loc.len]
    }

    /// Returns disjoint mutable views for every given location, in the order requested.
    ///
    /// This is what lets the chunk-reader's concurrent `(block, segment)` tasks write into fixed
    /// `(seriesIndex, chunkIndex)` slots in parallel without any unsafe aliasing: every returned
    /// slice genuinely does not overlap any other, which `split_at_mut` enforces for us.
    pub fn get_many_mut(&mut self, locs: &[SlabSlice]) -> Vec<&mut [T]> {
        let mut by_slab: std::collections::BTreeMap<usize, Vec<(usize, SlabSlice)>> =
            std::collections::BTreeMap::new();
        for (request_index, loc) in locs.iter().enumerate() {
            by_slab
                .entry(loc.slab_index)
                .or_default()
                .push((request_index, *loc));
        }

        let mut out: Vec<Option<&mut [T]>> = (0..locs.len()).map(|_| None).collect();

        for (slab_index, slab) in self.slabs.iter_mut().enumerate() {
            let Some(mut entries) = by_slab.remove(&slab_index) else {
                continue;
            };
            entries.sort_by_key(|(_, loc)| loc.start);
            let mut rest: &mut [T] = &mut slab[..];
            let mut consumed = 0;
            for (request_index, loc) in entries {
                let skip = loc.start - consumed;
                let (_, tail) = rest.split_at_mut(skip);
                let (piece, tail) = tail.split_at_mut(loc.len);
                rest = tail;
                consumed = loc.start + loc.len;
                out[request_index] = Some(piece);
            }
        }

        out.into_iter()
            .map(|slice| slice.expect("every requested location was visited"))
            .collect()
    }

    /// Returns every slab this arena touched back to the pool, zeroing their contents first.
    pub fn release(mut self) {
        for slab in self.slabs.drain(..) {
            self.pool.release_slab(slab);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_carves_within_one_slab_then_rolls_over() {
        let pool = Arc::new(SlabPool::<u64>::new(4));
        let mut arena = SlabArena::new(Arc::clone(&pool));

        let a = arena.reserve(2);
        let b = arena.reserve(2);
        assert_eq!(pool.allocated_slabs(), 1);

        // Doesn't fit in the remaining 0 slots of the first slab: rolls over.
        let c = arena.reserve(1);
        assert_eq!(pool.allocated_slabs(), 2);

        assert_eq!(arena.get(a).len(), 2);
        assert_eq!(arena.get(b).len(), 2);
        assert_eq!(arena.get(c).len(), 1);
    }

    #[test]
    fn get_many_mut_returns_disjoint_writable_views() {
        let pool = Arc::new(SlabPool::<u64>::new(8));
        let mut arena = SlabArena::new(Arc::clone(&pool));

        let locs = vec![arena.reserve(3), arena.reserve(2), arena.reserve(3)];
        {
            let mut views = arena.get_many_mut(&locs);
            for (i, view) in views.iter_mut().enumerate() {
                for slot in view.iter_mut() {
                    *slot = i as u64 + 1;
                }
            }
        }

        assert_eq!(arena.get(locs[0]), &[1, 1, 1]);
        assert_eq!(arena.get(locs[1]), &[2, 2]);
        assert_eq!(arena.get(locs[2]), &[3, 3, 3]);
    }

    #[test]
    fn release_returns_slabs_for_reuse() {
        let pool = Arc::new(SlabPool::<u64>::new(4));
        let mut arena = SlabArena::new(Arc::clone(&pool));
        arena.reserve(4);
        assert_eq!(pool.allocated_slabs(), 1);
        arena.release();

        let mut arena2 = SlabArena::new(Arc::clone(&pool));
        arena2.reserve(4);
        assert_eq!(
            pool.allocated_slabs(),
            1,
            "the second arena should have reused the released slab"
        );
    }
}
