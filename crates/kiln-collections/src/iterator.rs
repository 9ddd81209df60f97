//! Iterator objects: the state a `foreach` loop steps through.
//!
//! An iterator never copies its source container; it holds just enough to
//! produce the next element(s) and advance. Arrays and ranges yield a
//! single value per step, dicts yield a key/value pair, and `typeinfo`
//! (used by the analyzer to walk a compound type's member types) yields a
//! single type tag per step. The VM's `iterator`/`iterator_next` opcodes
//! read `arity()` once to decide how many locals to bind per iteration and
//! reject a foreach loop whose variable count doesn't match.

use crate::array::ArrayBackbone;
use crate::dict::DictKey;
use crate::handle::ObjectHandle;

/// One step's worth of bindings. A dict step hands back the raw
/// [`DictKey`] rather than a boxed handle: turning a `DictKey::Int` or
/// `DictKey::Str` into a loop-local `ObjectHandle` means allocating through
/// `ObjectStore`, which this crate doesn't own — `kiln-vm` does that
/// boxing once it receives the key.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    One(ObjectHandle),
    Two(DictKey, ObjectHandle),
}

#[derive(Debug, Clone, Copy)]
struct RangeState {
    start: i64,
    stop: i64,
    step: i64,
    current: i64,
}

impl RangeState {
    fn next(&mut self) -> Option<i64> {
        let done = if self.step > 0 { self.current >= self.stop } else { self.current <= self.stop };
        if done {
            return None;
        }
        let value = self.current;
        self.current += self.step;
        Some(value)
    }
}

enum Source {
    Array { cursor: Option<u32> },
    DictSmall { cursor: Option<u32> },
    DictBig { index: usize },
    Range(RangeState),
    TypeInfo { tags: Vec<u64>, index: usize },
}

/// A live iterator over one of the container kinds the VM can `foreach`
/// over. Borrows nothing; every `next_*` call takes the backing container
/// by reference so the iterator can outlive any one VM frame.
pub struct MesonIterator {
    source: Source,
}

impl MesonIterator {
    /// `head` is the array's own head cell index, read once at iterator
    /// creation (the same snapshot-cursor discipline `ArrayIter` uses).
    #[must_use]
    pub fn over_array(array: &ArrayBackbone) -> Self {
        Self { source: Source::Array { cursor: array.head() } }
    }

    #[must_use]
    pub fn over_small_dict(dict: &crate::dict::DictBackbone) -> Self {
        Self { source: Source::DictSmall { cursor: dict.head() } }
    }

    #[must_use]
    pub fn over_big_dict() -> Self {
        Self { source: Source::DictBig { index: 0 } }
    }

    #[must_use]
    pub fn over_range(start: i64, stop: i64, step: i64) -> Self {
        Self { source: Source::Range(RangeState { start, stop, step, current: start }) }
    }

    #[must_use]
    pub fn over_typeinfo(tags: Vec<u64>) -> Self {
        Self { source: Source::TypeInfo { tags, index: 0 } }
    }

    /// Number of locals a `foreach` binds per step: 1 for arrays, ranges,
    /// and typeinfo walks; 2 for dicts (key, value).
    #[must_use]
    pub fn arity(&self) -> usize {
        match &self.source {
            Source::Array { .. } | Source::Range(_) | Source::TypeInfo { .. } => 1,
            Source::DictSmall { .. } | Source::DictBig { .. } => 2,
        }
    }

    /// Advances an array iterator using the array's own cell storage.
    pub fn next_array(&mut self, cells: &kiln_arena::BucketArray<crate::array::ArrayCell>) -> Option<Step> {
        let Source::Array { cursor } = &mut self.source else {
            panic!("next_array called on a non-array iterator");
        };
        let idx = (*cursor)?;
        let cell = cells.get(idx as usize)?;
        *cursor = cell.next;
        Some(Step::One(cell.value))
    }

    /// Advances a small (linked-list) dict iterator.
    pub fn next_dict_small(&mut self, cells: &kiln_arena::BucketArray<crate::dict::DictCell>) -> Option<Step> {
        let Source::DictSmall { cursor } = &mut self.source else {
            panic!("next_dict_small called on a non-small-dict iterator");
        };
        let idx = (*cursor)?;
        let cell = cells.get(idx as usize)?;
        *cursor = cell.next;
        Some(Step::Two(cell.key, cell.value))
    }

    /// Advances a promoted (hash-table) dict iterator over a pre-collected
    /// insertion-ordered entry list.
    pub fn next_dict_big(&mut self, entries: &[(DictKey, ObjectHandle)]) -> Option<Step> {
        let Source::DictBig { index } = &mut self.source else {
            panic!("next_dict_big called on a non-big-dict iterator");
        };
        let (key, value) = entries.get(*index).copied()?;
        *index += 1;
        Some(Step::Two(key, value))
    }

    pub fn next_range(&mut self) -> Option<Step> {
        let Source::Range(state) = &mut self.source else {
            panic!("next_range called on a non-range iterator");
        };
        state.next().map(|i| Step::One(ObjectHandle(u32::try_from(i).unwrap_or(u32::MAX))))
    }

    pub fn next_typeinfo(&mut self) -> Option<u64> {
        let Source::TypeInfo { tags, index } = &mut self.source else {
            panic!("next_typeinfo called on a non-typeinfo iterator");
        };
        let tag = tags.get(*index).copied()?;
        *index += 1;
        Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_iterator_steps_forward() {
        let mut it = MesonIterator::over_range(0, 6, 2);
        let mut out = Vec::new();
        while let Some(Step::One(h)) = it.next_range() {
            out.push(h.index() as i64);
        }
        assert_eq!(out, vec![0, 2, 4]);
    }

    #[test]
    fn range_iterator_steps_backward() {
        let mut it = MesonIterator::over_range(5, 0, -1);
        let mut out = Vec::new();
        while let Some(Step::One(h)) = it.next_range() {
            out.push(h.index() as i64);
        }
        assert_eq!(out, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn arity_matches_container_kind() {
        let empty_array = ArrayBackbone::empty();
        let empty_dict = crate::dict::DictBackbone::empty();
        assert_eq!(MesonIterator::over_array(&empty_array).arity(), 1);
        assert_eq!(MesonIterator::over_range(0, 1, 1).arity(), 1);
        assert_eq!(MesonIterator::over_small_dict(&empty_dict).arity(), 2);
        assert_eq!(MesonIterator::over_big_dict().arity(), 2);
    }

    #[test]
    fn typeinfo_iterator_walks_tags_in_order() {
        let mut it = MesonIterator::over_typeinfo(vec![1, 2, 3]);
        assert_eq!(it.next_typeinfo(), Some(1));
        assert_eq!(it.next_typeinfo(), Some(2));
        assert_eq!(it.next_typeinfo(), Some(3));
        assert_eq!(it.next_typeinfo(), None);
    }
}
