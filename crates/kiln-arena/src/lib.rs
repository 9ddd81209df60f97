//! # Kiln Arena
//!
//! Bump arenas and the stable-pointer containers the VM's object model is
//! built on.
//!
//! ## Overview
//!
//! The VM never hands out Rust references into its object table that could
//! be invalidated by a later allocation — it hands out `u32` handles instead
//! (see `kiln-collections`). This crate supplies the containers that make
//! that discipline cheap: an arena that allocates in growable blocks, a
//! bucket array whose buckets never move once allocated, a seg-list whose
//! segments double in size, and a save/restore scratch stack used around
//! re-entrant evaluation (`subdir`, `subproject`, nested function calls).
//!
//! ## Architecture
//!
//! 1. [`Arena`] — growable bump allocator of blocks of `T`.
//! 2. [`BucketArray`] — append-only vector of fixed-size buckets; indices
//!    returned by [`BucketArray::push`] stay valid forever.
//! 3. [`SegList`] — like a bucket array, but segment `k` doubles in size.
//! 4. [`SaveStack`] — LIFO of saved VM state, tagged for debugging.

pub mod arena;
pub mod bucket_array;
pub mod save_stack;
pub mod seg_list;

pub use arena::{Arena, ArenaMark};
pub use bucket_array::BucketArray;
pub use save_stack::SaveStack;
pub use seg_list::SegList;
