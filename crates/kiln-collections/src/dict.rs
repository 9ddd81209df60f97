//! Dict objects: small linked list promoting to a hash table.
//!
//! While a dict has fewer than [`SMALL_DICT_THRESHOLD`] entries it's a
//! linked list of `{key, value, next}` cells (cheap to allocate, cheap to
//! iterate in insertion order, cheap to `cow`-duplicate). Past the
//! threshold it promotes to the open-addressed [`crate::hash::HashTable`];
//! promotion is one-way for that dict instance, matching the spec's "the
//! small-hash switch is irreversible for the lifetime of that dict
//! instance". Insertion order survives promotion via a side list of keys.

use kiln_arena::BucketArray;

use crate::handle::ObjectHandle;
use crate::hash::{fnv1a_64, HashKey, HashTable};
use crate::strtab::StrHandle;

/// Threshold at which a dict promotes from linked list to hash table.
pub const SMALL_DICT_THRESHOLD: usize = 15;

/// A dict key: either an interned string or an integer (the spec allows
/// integer-keyed dicts, flagged on the dict header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictKey {
    Str(StrHandle),
    Int(i64),
}

impl Default for DictKey {
    fn default() -> Self {
        DictKey::Int(0)
    }
}

impl HashKey for DictKey {
    fn hash_key(&self) -> u64 {
        match self {
            DictKey::Str(s) => fnv1a_64(&[b's']).wrapping_mul(fnv1a_64(&s.raw().to_le_bytes())),
            DictKey::Int(i) => fnv1a_64(&[b'i']).wrapping_mul(fnv1a_64(&i.to_le_bytes())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DictCell {
    pub key: DictKey,
    pub value: ObjectHandle,
    pub next: Option<u32>,
}

enum Repr {
    Small { head: Option<u32>, tail: Option<u32> },
    Big { table: HashTable<DictKey, ObjectHandle>, order: Vec<DictKey> },
}

pub struct DictBackbone {
    repr: Repr,
    len: usize,
    cow: bool,
    integer_keyed: bool,
}

impl DictBackbone {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            repr: Repr::Small { head: None, tail: None },
            len: 0,
            cow: false,
            integer_keyed: false,
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

    #[must_use]
    pub fn is_cow(&self) -> bool {
        self.cow
    }

    pub fn mark_cow(&mut self) {
        self.cow = true;
    }

    #[must_use]
    pub fn is_integer_keyed(&self) -> bool {
        self.integer_keyed
    }

    #[must_use]
    pub fn get(&self, cells: &BucketArray<DictCell>, key: DictKey) -> Option<ObjectHandle> {
        match &self.repr {
            Repr::Small { head, .. } => {
                let mut cur = *head;
                while let Some(idx) = cur {
                    let cell = cells.get(idx as usize)?;
                    if cell.key == key {
                        return Some(cell.value);
                    }
                    cur = cell.next;
                }
                None
            }
            Repr::Big { table, .. } => table.get(&key).copied(),
        }
    }

    /// Inserts or overwrites `key -> value`, duplicating the chain first
    /// if `cow` is set, and promoting to a hash table if this insert would
    /// cross [`SMALL_DICT_THRESHOLD`].
    pub fn set(&mut self, cells: &mut BucketArray<DictCell>, key: DictKey, value: ObjectHandle) {
        if self.cow {
            self.deep_copy(cells);
        }
        if matches!(key, DictKey::Int(_)) && self.len == 0 {
            self.integer_keyed = true;
        }

        match &mut self.repr {
            Repr::Small { head, tail } => {
                let mut cur = *head;
                while let Some(idx) = cur {
                    let cell = cells.get_mut(idx as usize).expect("valid small-dict chain");
                    if cell.key == key {
                        cell.value = value;
                        return;
                    }
                    cur = cell.next;
                }
                let idx = cells.push(DictCell { key, value, next: None }) as u32;
                match *tail {
                    Some(t) => cells.get_mut(t as usize).expect("valid tail").next = Some(idx),
                    None => *head = Some(idx),
                }
                *tail = Some(idx);
                self.len += 1;
                if self.len > SMALL_DICT_THRESHOLD {
                    self.promote(cells);
                }
            }
            Repr::Big { table, order } => {
                if table.get(&key).is_none() {
                    order.push(key);
                    self.len += 1;
                }
                table.insert(key, value);
            }
        }
    }

    fn promote(&mut self, cells: &BucketArray<DictCell>) {
        let Repr::Small { head, .. } = &self.repr else { return };
        let mut table: HashTable<DictKey, ObjectHandle> = HashTable::with_capacity(32);
        let mut order = Vec::with_capacity(self.len);
        let mut cur = *head;
        while let Some(idx) = cur {
            let cell = cells.get(idx as usize).expect("valid small-dict chain");
            table.insert(cell.key, cell.value);
            order.push(cell.key);
            cur = cell.next;
        }
        self.repr = Repr::Big { table, order };
    }

    pub fn deep_copy(&mut self, cells: &mut BucketArray<DictCell>) {
        let entries = self.entries(cells);
        self.repr = Repr::Small { head: None, tail: None };
        self.len = 0;
        self.cow = false;
        for (key, value) in entries {
            self.set(cells, key, value);
        }
    }

    /// Insertion-ordered `(key, value)` pairs — the contract the spec
    /// requires even after promotion.
    #[must_use]
    pub fn entries(&self, cells: &BucketArray<DictCell>) -> Vec<(DictKey, ObjectHandle)> {
        match &self.repr {
            Repr::Small { head, .. } => {
                let mut out = Vec::with_capacity(self.len);
                let mut cur = *head;
                while let Some(idx) = cur {
                    let cell = cells.get(idx as usize).expect("valid small-dict chain");
                    out.push((cell.key, cell.value));
                    cur = cell.next;
                }
                out
            }
            Repr::Big { table, order } => order
                .iter()
                .filter_map(|k| table.get(k).map(|v| (*k, *v)))
                .collect(),
        }
    }

    /// The head cell index, for a small (pre-promotion) dict only; `None`
    /// both when empty and when already promoted (callers check
    /// [`DictBackbone::is_promoted`] first, or just fall back to
    /// [`DictBackbone::entries`] for a promoted dict's iteration).
    #[must_use]
    pub fn head(&self) -> Option<u32> {
        match &self.repr {
            Repr::Small { head, .. } => *head,
            Repr::Big { .. } => None,
        }
    }

    #[must_use]
    pub fn is_promoted(&self) -> bool {
        matches!(self.repr, Repr::Big { .. })
    }
}

impl StrHandle {
    /// Raw interner index, exposed within this crate only so `DictKey`'s
    /// hash can mix it in without depending on string *content*.
    pub(crate) fn raw(self) -> u32 {
        self.into_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u32) -> ObjectHandle {
        ObjectHandle(n)
    }

    #[test]
    fn insertion_order_preserved_before_and_after_promotion() {
        let mut cells = BucketArray::new(4);
        let mut dict = DictBackbone::empty();
        for i in 0..30 {
            dict.set(&mut cells, DictKey::Int(i), h(i as u32));
        }
        let keys: Vec<i64> = dict
            .entries(&cells)
            .into_iter()
            .map(|(k, _)| match k {
                DictKey::Int(i) => i,
                DictKey::Str(_) => unreachable!(),
            })
            .collect();
        assert_eq!(keys, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn overwrite_keeps_single_entry() {
        let mut cells = BucketArray::new(4);
        let mut dict = DictBackbone::empty();
        dict.set(&mut cells, DictKey::Int(1), h(10));
        dict.set(&mut cells, DictKey::Int(1), h(20));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&cells, DictKey::Int(1)), Some(h(20)));
    }

    #[test]
    fn cow_copy_does_not_affect_original() {
        let mut cells = BucketArray::new(4);
        let mut a = DictBackbone::empty();
        a.set(&mut cells, DictKey::Int(1), h(1));

        // `b = a` in the VM shares the chain and flags both sides `cow`.
        let mut b = DictBackbone::empty();
        for (k, v) in a.entries(&cells) {
            b.set(&mut cells, k, v);
        }
        a.mark_cow();
        b.mark_cow();

        b.set(&mut cells, DictKey::Int(2), h(2));

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
    }

    proptest::proptest! {
        /// Iterating a dict yields keys in first-insertion order regardless
        /// of how many entries crossed the small-to-big promotion threshold,
        /// and regardless of later overwrites (which must not move a key).
        #[test]
        fn entries_preserve_first_insertion_order(keys in proptest::collection::vec(0i64..500, 1..60)) {
            let mut cells = BucketArray::new(4);
            let mut dict = DictBackbone::empty();
            let mut expected = Vec::new();
            for &k in &keys {
                let key = DictKey::Int(k);
                if !expected.contains(&k) {
                    expected.push(k);
                }
                dict.set(&mut cells, key, h((k.unsigned_abs() % 1000) as u32));
            }
            let got: Vec<i64> = dict
                .entries(&cells)
                .into_iter()
                .map(|(k, _)| match k {
                    DictKey::Int(i) => i,
                    DictKey::Str(_) => unreachable!(),
                })
                .collect();
            proptest::prop_assert_eq!(got, expected);
        }
    }
}
