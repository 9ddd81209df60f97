//! # Kiln Collections
//!
//! The object model shared by every stage of the pipeline after parsing:
//! an interned string pool, a tagged object table whose payloads live in
//! per-type bucket arrays, the open-addressed hash table dicts promote
//! into, and the array/dict/iterator object representations themselves.
//!
//! ## Architecture
//!
//! 1. [`handle`] — `ObjectHandle`, the 32-bit id every user-visible value is
//!    referred to by, plus the fixed singleton handles.
//! 2. [`strtab`] — content-interned string pool.
//! 3. [`hash`] — the generic open-addressed hash table backing promoted
//!    dicts.
//! 4. [`object`] — the tagged object table (`tag`, `payload_index`).
//! 5. [`array`] / [`dict`] — linked-cell array and small-list/hash dict
//!    object representations, both copy-on-write.
//! 6. [`iterator`] — the five iterator kinds the VM's `iterator`/
//!    `iterator_next` opcodes operate on.

pub mod array;
pub mod dict;
pub mod handle;
pub mod hash;
pub mod iterator;
pub mod object;
pub mod strtab;

pub use array::ArrayBackbone;
pub use dict::{DictBackbone, DictKey};
pub use handle::ObjectHandle;
pub use hash::HashTable;
pub use iterator::{MesonIterator, Step};
pub use object::{ObjectStore, Payload, Tag};
pub use strtab::{StrHandle, StringInterner};
