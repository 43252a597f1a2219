use bytes::Bytes;

/// A loaded chunk: raw encoded samples, or one or more precomputed aggregation variants for
/// downsampled blocks (`spec.md` §3, GLOSSARY "AggrChunk").
///
/// Every payload is opaque bytes as far as this pipeline is concerned -- decoding the chunk
/// encoding is a concern of the query engine, not the loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggrChunk {
    pub min_time: i64,
    pub max_time: i64,
    raw: Option<Bytes>,
    count: Option<Bytes>,
    sum: Option<Bytes>,
    min: Option<Bytes>,
    max: Option<Bytes>,
    counter: Option<Bytes>,
}

macro_rules! variant_accessors {
    ($field:ident, $getter:ident, $setter:ident) => {
        #[inline]
        pub fn $getter(&self) -> Option<&Bytes> {
            self.$field.as_ref()
        }

        #[inline]
        pub fn $setter(&mut self, bytes: Bytes) {
            self.$field = Some(bytes);
        }
    };
}

impl AggrChunk {
    /// An empty chunk with the given time bounds, ready to have its payload(s) populated by the
    /// chunk reader (`spec.md` §4.2, step 5: "populate `MinTime`/`MaxTime` from the refs").
    pub fn with_time_bounds(min_time: i64, max_time: i64) -> Self {
        Self {
            min_time,
            max_time,
            ..Default::default()
        }
    }

    /// Clears every field back to its zero value, including dropping byte payloads -- the
    /// per-chunk half of `ChunkSet::release` (`spec.md` §4.1, "zero every field, drop byte
    /// slices").
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
            && self.count.is_none()
            && self.sum.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.counter.is_none()
    }

    variant_accessors!(raw, raw, set_raw);
    variant_accessors!(count, count, set_count);
    variant_accessors!(sum, sum, set_sum);
    variant_accessors!(min, min, set_min);
    variant_accessors!(max, max, set_max);
    variant_accessors!(counter, counter, set_counter);

    /// Total payload bytes across every populated variant, used for the
    /// `chunks_loader_chunk_bytes_total` metric.
    pub fn payload_bytes(&self) -> usize {
        [&self.raw, &self.count, &self.sum, &self.min, &self.max, &self.counter]
            .into_iter()
            .filter_map(|v| v.as_ref())
            .map(Bytes::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_every_payload_and_bound() {
        let mut chunk = AggrChunk::with_time_bounds(10, 20);
        chunk.set_raw(Bytes::from_static(b"raw"));
        chunk.set_sum(Bytes::from_static(b"sum"));
        assert!(!chunk.is_empty());

        chunk.reset();
        assert!(chunk.is_empty());
        assert_eq!(chunk.min_time, 0);
        assert_eq!(chunk.max_time, 0);
    }

    #[test]
    fn payload_bytes_sums_every_populated_variant() {
        let mut chunk = AggrChunk::with_time_bounds(0, 1);
        chunk.set_count(Bytes::from_static(b"ab"));
        chunk.set_sum(Bytes::from_static(b"cde"));
        assert_eq!(chunk.payload_bytes(), 5);
    }
}
