//! Bucket array: a vector of fixed-size buckets.
//!
//! `push` appends into the current bucket, starting a new one on overflow;
//! `get`/`get_mut` compute `(i / bucket_size, i % bucket_size)`. Because a
//! bucket, once allocated, never grows past its reserved capacity and is
//! never moved, indices handed out by `push` stay valid for the life of the
//! bucket array — the property the object table in `kiln-collections`
//! depends on.

/// A bucket of `T`, growing up to `bucket_size` before a new bucket starts.
#[derive(Debug)]
pub struct BucketArray<T> {
    bucket_size: usize,
    buckets: Vec<Vec<T>>,
    len: usize,
}

/// A mark taken with [`BucketArray::save`], passed to [`BucketArray::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketArrayMark(usize);

impl<T> BucketArray<T> {
    #[must_use]
    pub fn new(bucket_size: usize) -> Self {
        Self {
            bucket_size: bucket_size.max(1),
            buckets: Vec::new(),
            len: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.bucket_size, index % self.bucket_size)
    }

    /// Appends `value`, returning the handle index to retrieve it later.
    pub fn push(&mut self, value: T) -> usize {
        let (bucket, _) = self.locate(self.len);
        if bucket == self.buckets.len() {
            self.buckets.push(Vec::with_capacity(self.bucket_size));
        }
        self.buckets[bucket].push(value);
        let index = self.len;
        self.len += 1;
        index
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let (bucket, slot) = self.locate(index);
        self.buckets.get(bucket).and_then(|b| b.get(slot))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        let (bucket, slot) = self.locate(index);
        self.buckets.get_mut(bucket).and_then(|b| b.get_mut(slot))
    }

    /// Takes a mark recording the current length.
    #[must_use]
    pub fn save(&self) -> BucketArrayMark {
        BucketArrayMark(self.len)
    }

    /// Restores to a prior mark, dropping (and for `Default` element types,
    /// zeroing) the vacated tail.
    pub fn restore(&mut self, mark: BucketArrayMark) {
        assert!(mark.0 <= self.len, "bucket array mark is ahead of current length");
        for (bucket_idx, bucket) in self.buckets.iter_mut().enumerate() {
            let bucket_start = bucket_idx * self.bucket_size;
            if bucket_start >= mark.0 {
                bucket.clear();
            } else {
                let keep = mark.0 - bucket_start;
                if keep < bucket.len() {
                    bucket.truncate(keep);
                }
            }
        }
        self.len = mark.0;
    }
}

impl<T> Default for BucketArray<T> {
    fn default() -> Self {
        // 4096 matches the object table's expected per-tag payload density;
        // callers with different shapes should pick their own size.
        Self::new(4096)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_survive_growth() {
        let mut arr: BucketArray<i32> = BucketArray::new(2);
        let a = arr.push(1);
        let b = arr.push(2);
        let c = arr.push(3); // starts a new bucket
        assert_eq!(arr.get(a), Some(&1));
        assert_eq!(arr.get(b), Some(&2));
        assert_eq!(arr.get(c), Some(&3));
    }

    #[test]
    fn restore_drops_tail() {
        let mut arr: BucketArray<i32> = BucketArray::new(3);
        arr.push(1);
        let mark = arr.save();
        arr.push(2);
        arr.push(3);
        arr.push(4);
        assert_eq!(arr.len(), 4);
        arr.restore(mark);
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.get(0), Some(&1));
        assert_eq!(arr.get(1), None);
    }

    #[test]
    fn handle_stability_property(){
        let mut arr: BucketArray<usize> = BucketArray::new(4);
        let mut handles = Vec::new();
        for i in 0..100 {
            handles.push(arr.push(i));
        }
        for (expected, handle) in handles.into_iter().enumerate() {
            assert_eq!(arr.get(handle), Some(&expected));
        }
    }

    proptest::proptest! {
        /// A handle issued by `push` keeps resolving to its payload no matter
        /// how many further pushes land in later buckets.
        #[test]
        fn handles_survive_any_sequence_of_later_pushes(
            bucket_size in 1usize..8,
            values in proptest::collection::vec(0i64..1000, 1..200),
        ) {
            let mut arr: BucketArray<i64> = BucketArray::new(bucket_size);
            let mut handles = Vec::with_capacity(values.len());
            for &v in &values {
                handles.push(arr.push(v));
            }
            for (&expected, &handle) in values.iter().zip(handles.iter()) {
                proptest::prop_assert_eq!(arr.get(handle), Some(&expected));
            }
        }
    }
}
