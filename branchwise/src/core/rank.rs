//! Priority-bucketed multimap that flattens into one ordered sequence.

use std::collections::BTreeMap;

/// Ordered multimap from an integer priority to the values added at it.
///
/// Rank keys are kept sorted and only exist for non-empty buckets. Values
/// within a bucket keep their insertion order.
#[derive(Debug, Clone)]
pub struct Rank<T> {
    buckets: BTreeMap<i64, Vec<T>>,
    len: usize,
}

impl<T> Default for Rank<T> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
        }
    }
}

impl<T> Rank<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `elem` to the bucket for `rank`.
    pub fn add(&mut self, rank: i64, elem: T) {
        self.buckets.entry(rank).or_default().push(elem);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// Rank keys in ascending order.
    pub fn ranks(&self) -> impl Iterator<Item = i64> + '_ {
        self.buckets.keys().copied()
    }

    /// Highest rank first, insertion order within a bucket.
    pub fn build(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.len);
        for bucket in self.buckets.values().rev() {
            out.extend(bucket.iter());
        }
        out
    }

    /// Lowest rank first, reverse insertion order within a bucket.
    ///
    /// This is exactly `build()` reversed.
    pub fn build_rev(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.len);
        for bucket in self.buckets.values() {
            out.extend(bucket.iter().rev());
        }
        out
    }

    /// Owned variant of [`Rank::build`].
    pub fn into_build(self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        for (_, bucket) in self.buckets.into_iter().rev() {
            out.extend(bucket);
        }
        out
    }
}
