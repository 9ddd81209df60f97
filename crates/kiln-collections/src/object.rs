//! The tagged object table.
//!
//! `ObjectStore` is the `(tag, payload_index)` table described in the data
//! model: every handle resolves to a tag that never changes after
//! allocation, and to a payload slot that survives any later growth of the
//! table. Payloads for the "core" value kinds (scalars, strings, arrays,
//! dicts, iterators, functions) are owned directly by this crate. The
//! higher-level build-domain kinds (`BuildTarget`, `Dependency`, `Option`,
//! …) are opaque here — `kiln-vm` allocates a tag + slot pair through
//! [`ObjectStore::alloc_ext`] and keeps the actual payload in its own
//! store, so the domain-agnostic core never has to know about targets or
//! dependencies.

use kiln_arena::BucketArray;

use crate::array::{ArrayBackbone, ArrayCell};
use crate::dict::{DictBackbone, DictCell};
use crate::handle::ObjectHandle;
use crate::strtab::StrHandle;

/// Every object kind named in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    None,
    Null,
    Disabler,
    Bool,
    Str,
    Num,
    File,
    Array,
    Dict,
    FuncDef,
    Capture,
    TypeInfo,
    Iterator,
    MachineKind,
    FeatureOption,
    // Build-domain kinds; payload owned by `kiln-vm`.
    Compiler,
    BuildTarget,
    CustomTarget,
    Subproject,
    Dependency,
    ExternalProgram,
    RunResult,
    ConfigurationData,
    Test,
    Module,
    InstallTarget,
    Environment,
    IncludeDirectory,
    Option,
    Generator,
    GeneratedList,
    AliasTarget,
    BothLibs,
    SourceSet,
    SourceConfiguration,
}

impl Tag {
    /// Whether this tag's payload is owned by `kiln-collections` itself
    /// (`true`) or by an external domain store addressed through
    /// [`ObjectStore::alloc_ext`] (`false`).
    #[must_use]
    pub fn is_core(self) -> bool {
        !matches!(
            self,
            Tag::Compiler
                | Tag::BuildTarget
                | Tag::CustomTarget
                | Tag::Subproject
                | Tag::Dependency
                | Tag::ExternalProgram
                | Tag::RunResult
                | Tag::ConfigurationData
                | Tag::Test
                | Tag::Module
                | Tag::InstallTarget
                | Tag::Environment
                | Tag::IncludeDirectory
                | Tag::Option
                | Tag::Generator
                | Tag::GeneratedList
                | Tag::AliasTarget
                | Tag::BothLibs
                | Tag::SourceSet
                | Tag::SourceConfiguration
        )
    }
}

/// A file object: a strong-typed path, distinguishing generated (built)
/// paths from source-tree paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRef {
    pub path: StrHandle,
    pub is_built: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineKind {
    Host,
    Build,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Auto,
    Enabled,
    Disabled,
}

/// The payload for a core-owned object. Stored inline in the main table so
/// scalars never need a second indirection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Unit,
    Bool(bool),
    Num(i64),
    Str(StrHandle),
    File(FileRef),
    Array(u32),    // index into `arrays`
    Dict(u32),     // index into `dicts`
    FuncDef(u32),  // index into an external function-def table (kiln-vm)
    Capture(u32),  // ditto
    TypeInfo(u64), // the 64-bit type tag itself
    Iterator(u32), // index into an external iterator table (kiln-vm)
    MachineKind(MachineKind),
    FeatureOption(FeatureState),
    /// External domain object: `(tag, slot)` owned by `kiln-vm`.
    Ext(u32),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    tag: Tag,
    payload: Payload,
}

/// The central object table plus the core containers it directly owns.
pub struct ObjectStore {
    entries: BucketArray<Entry>,
    pub arrays: BucketArray<ArrayBackbone>,
    pub dicts: BucketArray<DictBackbone>,
    /// Cell storage shared by every array, so cells never move once
    /// allocated (see `array.rs`).
    pub array_cells: BucketArray<ArrayCell>,
    /// Cell storage shared by every small (pre-promotion) dict.
    pub dict_cells: BucketArray<DictCell>,
}

impl ObjectStore {
    #[must_use]
    pub fn new() -> Self {
        let mut entries = BucketArray::new(4096);
        // Handle 0..=5 are the fixed singletons; push them in that exact
        // order so `ObjectHandle::NONE..=FALSE` line up.
        entries.push(Entry { tag: Tag::None, payload: Payload::Unit });
        entries.push(Entry { tag: Tag::Null, payload: Payload::Unit });
        entries.push(Entry { tag: Tag::Disabler, payload: Payload::Unit });
        entries.push(Entry { tag: Tag::Module, payload: Payload::Ext(0) }); // the `meson` builtin object
        entries.push(Entry { tag: Tag::Bool, payload: Payload::Bool(true) });
        entries.push(Entry { tag: Tag::Bool, payload: Payload::Bool(false) });
        Self {
            entries,
            arrays: BucketArray::new(1024),
            dicts: BucketArray::new(1024),
            array_cells: BucketArray::new(4096),
            dict_cells: BucketArray::new(4096),
        }
    }

    /// Allocates a fresh empty array object and returns its handle.
    pub fn new_array(&mut self) -> ObjectHandle {
        self.alloc_array(ArrayBackbone::empty())
    }

    /// Allocates a fresh empty dict object and returns its handle.
    pub fn new_dict(&mut self) -> ObjectHandle {
        self.alloc_dict(DictBackbone::empty())
    }

    /// Mutable access to the array backbone a handle resolves to, if `handle`
    /// is indeed an array.
    pub fn array_mut(&mut self, handle: ObjectHandle) -> Option<&mut ArrayBackbone> {
        match self.payload_of(handle)? {
            Payload::Array(idx) => self.arrays.get_mut(idx as usize),
            _ => None,
        }
    }

    #[must_use]
    pub fn array(&self, handle: ObjectHandle) -> Option<&ArrayBackbone> {
        match self.payload_of(handle)? {
            Payload::Array(idx) => self.arrays.get(idx as usize),
            _ => None,
        }
    }

    pub fn dict_mut(&mut self, handle: ObjectHandle) -> Option<&mut DictBackbone> {
        match self.payload_of(handle)? {
            Payload::Dict(idx) => self.dicts.get_mut(idx as usize),
            _ => None,
        }
    }

    #[must_use]
    pub fn dict(&self, handle: ObjectHandle) -> Option<&DictBackbone> {
        match self.payload_of(handle)? {
            Payload::Dict(idx) => self.dicts.get(idx as usize),
            _ => None,
        }
    }

    #[must_use]
    pub fn tag_of(&self, handle: ObjectHandle) -> Option<Tag> {
        self.entries.get(handle.index()).map(|e| e.tag)
    }

    #[must_use]
    pub fn payload_of(&self, handle: ObjectHandle) -> Option<Payload> {
        self.entries.get(handle.index()).map(|e| e.payload)
    }

    fn alloc(&mut self, tag: Tag, payload: Payload) -> ObjectHandle {
        ObjectHandle(self.entries.push(Entry { tag, payload }) as u32)
    }

    pub fn alloc_bool(&mut self, value: bool) -> ObjectHandle {
        if value { ObjectHandle::TRUE } else { ObjectHandle::FALSE }
    }

    pub fn alloc_num(&mut self, value: i64) -> ObjectHandle {
        self.alloc(Tag::Num, Payload::Num(value))
    }

    pub fn alloc_str(&mut self, s: StrHandle) -> ObjectHandle {
        self.alloc(Tag::Str, Payload::Str(s))
    }

    pub fn alloc_file(&mut self, path: StrHandle, is_built: bool) -> ObjectHandle {
        self.alloc(Tag::File, Payload::File(FileRef { path, is_built }))
    }

    pub fn alloc_array(&mut self, backbone: ArrayBackbone) -> ObjectHandle {
        let idx = self.arrays.push(backbone) as u32;
        self.alloc(Tag::Array, Payload::Array(idx))
    }

    pub fn alloc_dict(&mut self, backbone: DictBackbone) -> ObjectHandle {
        let idx = self.dicts.push(backbone) as u32;
        self.alloc(Tag::Dict, Payload::Dict(idx))
    }

    pub fn alloc_typeinfo(&mut self, type_tag: u64) -> ObjectHandle {
        self.alloc(Tag::TypeInfo, Payload::TypeInfo(type_tag))
    }

    /// Allocates a function-value object. `slot` indexes the external
    /// function table (`kiln-vm`'s registered `FuncProto`s).
    pub fn alloc_funcdef(&mut self, slot: u32) -> ObjectHandle {
        self.alloc(Tag::FuncDef, Payload::FuncDef(slot))
    }

    /// Allocates a bound-callable object (a builtin bound to a receiver, or
    /// a bare module function). `slot` indexes `kiln-vm`'s own capture table.
    pub fn alloc_capture(&mut self, slot: u32) -> ObjectHandle {
        self.alloc(Tag::Capture, Payload::Capture(slot))
    }

    /// Allocates an iterator object. `slot` indexes `kiln-vm`'s own live
    /// [`crate::iterator::MesonIterator`] table.
    pub fn alloc_iterator(&mut self, slot: u32) -> ObjectHandle {
        self.alloc(Tag::Iterator, Payload::Iterator(slot))
    }

    pub fn alloc_machine_kind(&mut self, kind: MachineKind) -> ObjectHandle {
        self.alloc(Tag::MachineKind, Payload::MachineKind(kind))
    }

    pub fn alloc_feature_option(&mut self, state: FeatureState) -> ObjectHandle {
        self.alloc(Tag::FeatureOption, Payload::FeatureOption(state))
    }

    /// Allocates an external (`kiln-vm`-owned) domain object. `slot` is
    /// whatever index `kiln-vm`'s own store uses internally; this crate
    /// never interprets it.
    pub fn alloc_ext(&mut self, tag: Tag, slot: u32) -> ObjectHandle {
        debug_assert!(!tag.is_core(), "alloc_ext used for a core tag");
        self.alloc(tag, Payload::Ext(slot))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_tags_are_fixed() {
        let store = ObjectStore::new();
        assert_eq!(store.tag_of(ObjectHandle::NONE), Some(Tag::None));
        assert_eq!(store.tag_of(ObjectHandle::DISABLER), Some(Tag::Disabler));
        assert_eq!(store.tag_of(ObjectHandle::TRUE), Some(Tag::Bool));
        assert_eq!(store.tag_of(ObjectHandle::FALSE), Some(Tag::Bool));
    }

    #[test]
    fn handles_survive_growth() {
        let mut store = ObjectStore::new();
        let mut handles = Vec::new();
        for i in 0..5000 {
            handles.push(store.alloc_num(i));
        }
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(store.payload_of(*h), Some(Payload::Num(i as i64)));
        }
    }

    #[test]
    fn tag_never_changes_after_alloc() {
        let mut store = ObjectStore::new();
        let h = store.alloc_num(42);
        let tag_before = store.tag_of(h);
        let _ = store.alloc_num(7);
        assert_eq!(store.tag_of(h), tag_before);
    }
}
