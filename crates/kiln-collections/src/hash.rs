//! Generic open-addressed hash table.
//!
//! Power-of-two capacity, linear probing, one metadata byte per slot: the
//! high bit marks empty (`0x80`), `0xFE` marks a deleted slot (tombstone),
//! otherwise the low 7 bits cache the key's hash for a cheap mismatch
//! check before touching the keys array. Keys and values live in
//! [`kiln_arena::SegList`]s addressed by a dense key-index that the probe
//! array's slots point at; deleting a key swaps it with the tail of the
//! keys list and fixes up whichever slot pointed at the tail.
//!
//! Promoted [`crate::dict::Dict`]s are the primary user; this table never
//! knows about Meson values, only `K: HashKey` and an opaque `V`.

use kiln_arena::SegList;

const EMPTY: u8 = 0x80;
const DELETED: u8 = 0xFE;

/// 64-bit FNV-1a over raw bytes.
#[must_use]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Keys usable in a [`HashTable`] supply their own 64-bit hash; this lets
/// string keys hash `(ptr, len)` content while integer keys hash their bit
/// pattern directly, without the table caring which.
pub trait HashKey: Clone + PartialEq + Default {
    fn hash_key(&self) -> u64;
}

impl HashKey for u64 {
    fn hash_key(&self) -> u64 {
        fnv1a_64(&self.to_le_bytes())
    }
}

impl HashKey for i64 {
    fn hash_key(&self) -> u64 {
        fnv1a_64(&self.to_le_bytes())
    }
}

impl HashKey for u32 {
    fn hash_key(&self) -> u64 {
        fnv1a_64(&self.to_le_bytes())
    }
}

/// Open-addressed hash table mapping `K` to `V`.
pub struct HashTable<K, V> {
    meta: Vec<u8>,
    slots: Vec<u32>, // index into `keys`/`values`, valid only where meta[i] is neither EMPTY nor DELETED
    keys: SegList<K>,
    values: SegList<V>,
    mask: usize,
    occupied: usize, // live entries, excludes tombstoned probe slots
}

impl<K: HashKey, V: Default> HashTable<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(8);
        Self {
            meta: vec![EMPTY; capacity],
            slots: vec![0; capacity],
            keys: SegList::new(16),
            values: SegList::new(16),
            mask: capacity - 1,
            occupied: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn probe_tag(hash: u64) -> u8 {
        (hash & 0x7f) as u8
    }

    /// Finds the probe slot for `key`: `Ok(slot)` if present, `Err(slot)`
    /// for the first empty/deleted slot on the probe sequence (where an
    /// insert should land).
    fn find(&self, key: &K) -> Result<usize, usize> {
        let hash = key.hash_key();
        let tag = Self::probe_tag(hash);
        let mut idx = (hash as usize) & self.mask;
        let mut first_free = None;
        for _ in 0..=self.mask {
            let m = self.meta[idx];
            if m == EMPTY {
                return Err(first_free.unwrap_or(idx));
            }
            if m == DELETED {
                if first_free.is_none() {
                    first_free = Some(idx);
                }
            } else if m == tag {
                let key_index = self.slots[idx] as usize;
                if self.keys.get(key_index) == Some(key) {
                    return Ok(idx);
                }
            }
            idx = (idx + 1) & self.mask;
        }
        Err(first_free.unwrap_or(idx))
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.find(key) {
            Ok(slot) => self.values.get(self.slots[slot] as usize),
            Err(_) => None,
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.find(key) {
            Ok(slot) => self.values.get_mut(self.slots[slot] as usize),
            Err(_) => None,
        }
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        matches!(self.find(key), Ok(_))
    }

    /// Inserts or overwrites `key -> value`, growing the table first if the
    /// load factor would exceed 0.5.
    pub fn insert(&mut self, key: K, value: V) {
        if (self.occupied + 1) * 2 > self.meta.len() {
            self.grow();
        }
        match self.find(&key) {
            Ok(slot) => {
                let key_index = self.slots[slot] as usize;
                if let Some(v) = self.values.get_mut(key_index) {
                    *v = value;
                }
            }
            Err(slot) => {
                let key_index = self.keys.len();
                self.keys.push(key.clone());
                self.values.push(value);
                self.meta[slot] = Self::probe_tag(key.hash_key());
                self.slots[slot] = key_index as u32;
                self.occupied += 1;
            }
        }
    }

    /// Removes `key`, tail-swapping the backing key/value out of the dense
    /// `keys`/`values` lists and fixing up the one probe slot (if any) that
    /// referenced the old tail position.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = match self.find(key) {
            Ok(slot) => slot,
            Err(_) => return None,
        };
        let removed_index = self.slots[slot] as usize;
        let tail_index = self.keys.len() - 1;

        self.meta[slot] = DELETED;

        if removed_index != tail_index {
            let tail_key = self.keys.get(tail_index).cloned();
            if let Some(tail_key) = tail_key {
                if let Ok(tail_slot) = self.find(&tail_key) {
                    self.slots[tail_slot] = removed_index as u32;
                }
            }
            self.keys.swap(removed_index, tail_index);
            self.values.swap(removed_index, tail_index);
        }

        // Pop the (now-tail) removed entry off both dense lists.
        let new_len = tail_index;
        let value = self.values.get_mut(new_len).map(std::mem::take);
        self.keys.truncate(new_len);
        self.values.truncate(new_len);
        self.occupied -= 1;
        value
    }

    fn grow(&mut self) {
        let new_cap = (self.meta.len() * 2).max(8);
        self.meta = vec![EMPTY; new_cap];
        self.slots = vec![0; new_cap];
        self.mask = new_cap - 1;
        self.occupied = 0;
        for key_index in 0..self.keys.len() {
            let Some(key) = self.keys.get(key_index).cloned() else {
                continue;
            };
            let hash = key.hash_key();
            let tag = Self::probe_tag(hash);
            let mut idx = (hash as usize) & self.mask;
            loop {
                if self.meta[idx] == EMPTY {
                    self.meta[idx] = tag;
                    self.slots[idx] = key_index as u32;
                    self.occupied += 1;
                    break;
                }
                idx = (idx + 1) & self.mask;
            }
        }
    }

    /// Iterates `(key, value)` pairs in dense-storage order (*not*
    /// insertion order after deletions have swapped tails around — callers
    /// that need stable insertion order use [`crate::dict::Dict`]'s
    /// separate order list instead).
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        (0..self.keys.len()).filter_map(move |i| Some((self.keys.get(i)?, self.values.get(i)?)))
    }
}

impl<K: HashKey, V: Default> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_round_trip() {
        let mut table: HashTable<u64, &'static str> = HashTable::new();
        table.insert(1, "one");
        table.insert(2, "two");
        table.insert(3, "three");
        assert_eq!(table.get(&2), Some(&"two"));
        assert_eq!(table.remove(&2), Some("two"));
        assert_eq!(table.get(&2), None);
        assert_eq!(table.get(&1), Some(&"one"));
        assert_eq!(table.get(&3), Some(&"three"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn grows_past_load_factor() {
        let mut table: HashTable<u64, u64> = HashTable::with_capacity(8);
        for i in 0..100 {
            table.insert(i, i * 10);
        }
        for i in 0..100 {
            assert_eq!(table.get(&i), Some(&(i * 10)));
        }
    }

    #[test]
    fn overwrite_keeps_single_entry() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        table.insert(5, 1);
        table.insert(5, 2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&5), Some(&2));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u64, u64),
        Remove(u64),
    }

    fn op() -> impl proptest::strategy::Strategy<Value = Op> {
        proptest::prop_oneof![
            (0u64..20, 0u64..1000).prop_map(|(k, v)| Op::Insert(k, v)),
            (0u64..20).prop_map(Op::Remove),
        ]
    }

    proptest::proptest! {
        /// After any sequence of inserts/removes, `get` agrees with a plain
        /// `HashMap` oracle and iteration visits every live key exactly once.
        #[test]
        fn matches_a_hash_map_oracle_after_any_op_sequence(ops in proptest::collection::vec(op(), 0..100)) {
            let mut table: HashTable<u64, u64> = HashTable::new();
            let mut oracle = std::collections::HashMap::new();
            for op in ops {
                match op {
                    Op::Insert(k, v) => {
                        table.insert(k, v);
                        oracle.insert(k, v);
                    }
                    Op::Remove(k) => {
                        table.remove(&k);
                        oracle.remove(&k);
                    }
                }
            }
            for k in 0u64..20 {
                proptest::prop_assert_eq!(table.get(&k), oracle.get(&k));
            }
            let mut seen = std::collections::HashSet::new();
            for (k, _) in table.iter() {
                proptest::prop_assert!(seen.insert(*k), "key {} visited twice", k);
            }
            proptest::prop_assert_eq!(seen.len(), oracle.len());
        }
    }
}
