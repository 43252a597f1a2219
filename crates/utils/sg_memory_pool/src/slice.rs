use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

/// A capacity-keyed pool of `Vec<T>` buffers.
///
/// `grab(capacity)` returns a `Vec` with `capacity() >= capacity`, reusing a previously recycled
/// buffer when one is available in the matching bucket. `recycle` only keeps a buffer if its
/// capacity is at least the bucket it's filed under; undersized buffers are dropped rather than
/// grown, per `spec.md` §4.1 ("a retrieved slice with insufficient capacity is discarded, not
/// re-grown").
///
/// Buckets are keyed by the next power of two at or above the requested capacity, so a pipeline
/// running with a roughly stable `fromBatchSize` converges to a small number of hot buckets.
pub struct SlicePool<T> {
    buckets: Mutex<std::collections::HashMap<usize, Vec<Vec<T>>>>,
    /// Net outstanding allocations: incremented on every fresh `Vec::with_capacity`, decremented
    /// on every successful `recycle`. Used by tests to assert the pool drains back to zero.
    outstanding: AtomicI64,
}

impl<T> Default for SlicePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlicePool<T> {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(std::collections::HashMap::new()),
            outstanding: AtomicI64::new(0),
        }
    }

    fn bucket_of(capacity: usize) -> usize {
        capacity.max(1).next_power_of_two()
    }

    /// Returns a buffer with `capacity() >= capacity` and `len() == 0`.
    pub fn grab(&self, capacity: usize) -> Vec<T> {
        let bucket = Self::bucket_of(capacity);
        let recycled = self.buckets.lock().get_mut(&bucket).and_then(Vec::pop);
        match recycled {
            Some(mut buf) => {
                debug_assert!(buf.capacity() >= capacity);
                buf.clear();
                buf
            }
            None => {
                self.outstanding.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(bucket)
            }
        }
    }

    /// Returns a buffer to the pool. The buffer's length must already be zero; callers are
    /// responsible for dropping or resetting any elements before recycling (see
    /// `ChunkSet::release`).
    pub fn recycle(&self, buf: Vec<T>) {
        debug_assert!(buf.is_empty(), "recycle expects a truncated buffer");
        let bucket = Self::bucket_of(buf.capacity());
        if buf.capacity() < bucket {
            // Shouldn't happen for buffers we handed out ourselves, but a caller-constructed
            // buffer with an odd capacity is simply dropped rather than mis-filed.
            return;
        }
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        self.buckets.lock().entry(bucket).or_default().push(buf);
    }

    /// Net number of buffers currently allocated and not yet recycled. Used by tests to verify
    /// the *pool return* invariant (`spec.md` §8).
    pub fn outstanding(&self) -> i64 {
        self.outstanding.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grab_reuses_recycled_buffers() {
        let pool: SlicePool<u32> = SlicePool::new();

        let buf = pool.grab(10);
        assert!(buf.capacity() >= 10);
        assert_eq!(pool.outstanding(), 1);

        pool.recycle(buf);
        assert_eq!(pool.outstanding(), 0);

        let buf2 = pool.grab(10);
        assert_eq!(pool.outstanding(), 0, "should have reused the recycled buffer");
        drop(buf2);
    }

    #[test]
    fn undersized_recycled_buffer_is_not_reused_for_a_larger_request() {
        let pool: SlicePool<u32> = SlicePool::new();

        let small = pool.grab(4);
        pool.recycle(small);
        assert_eq!(pool.outstanding(), 0);

        // A much bigger request falls in a different bucket, so it must allocate fresh.
        let big = pool.grab(256);
        assert_eq!(pool.outstanding(), 1);
        drop(big);
    }
}
