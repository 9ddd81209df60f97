//! The builtin function table: module-level functions (`project`,
//! `executable`, `message`, …) and object methods (`'a'.to_upper()`,
//! `arr.contains(x)`, …), looked up by name/receiver-tag pair and dispatched
//! by [`crate::vm::Vm::call_builtin`].
//!
//! Real Meson ships 200+ of these; we give a representative cross-section —
//! the ones that exercise every argument-passing shape (positional, kwarg,
//! `listify`, variadic) and every object kind the analyzer needs to walk —
//! real semantics, and register the remainder as
//! [`crate::error::VmError::UnimplementedBuiltin`] stubs so a script that
//! calls one fails with a clear, specific message instead of `NotCallable`.

mod containers;
mod core;
mod strings;
mod targets;

use std::collections::HashMap;

use indexmap::IndexMap;
use kiln_collections::{ObjectHandle, Tag};

use crate::error::{VmError, VmResult};
use crate::vm::Vm;

pub type BuiltinFn = fn(&mut Vm, BuiltinArgs) -> VmResult<ObjectHandle>;

/// Arguments handed to a builtin, already split into receiver/positional/
/// keyword per the `Call` opcode's stack layout — arity and unknown-kwarg
/// validation already happened in [`BuiltinTable::dispatch`].
#[derive(Debug)]
pub struct BuiltinArgs {
    pub receiver: Option<ObjectHandle>,
    pub positional: Vec<ObjectHandle>,
    pub kwargs: IndexMap<String, ObjectHandle>,
}

impl BuiltinArgs {
    #[must_use]
    pub fn pos(&self, i: usize) -> Option<ObjectHandle> {
        self.positional.get(i).copied()
    }

    #[must_use]
    pub fn kwarg(&self, name: &str) -> Option<ObjectHandle> {
        self.kwargs.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinId(pub u32);

struct BuiltinDescriptor {
    name: &'static str,
    func: BuiltinFn,
    min_positional: usize,
    max_positional: Option<usize>,
    required_kwargs: &'static [&'static str],
    optional_kwargs: &'static [&'static str],
}

/// The registered set of builtins, built once in [`Vm::new`]. `global` holds
/// module-level (no-receiver) functions; `methods` holds `receiver.name(...)`
/// dispatch keyed by the receiver's [`Tag`].
#[derive(Default)]
pub struct BuiltinTable {
    descriptors: Vec<BuiltinDescriptor>,
    global: HashMap<&'static str, usize>,
    methods: HashMap<(Tag, &'static str), usize>,
    stub_global: HashMap<&'static str, ()>,
}

impl BuiltinTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self::default();
        core::register(&mut table);
        strings::register(&mut table);
        containers::register(&mut table);
        targets::register(&mut table);
        table.register_stubs();
        table
    }

    fn add_global(
        &mut self,
        name: &'static str,
        func: BuiltinFn,
        min_positional: usize,
        max_positional: Option<usize>,
        required_kwargs: &'static [&'static str],
        optional_kwargs: &'static [&'static str],
    ) {
        let id = self.descriptors.len();
        self.descriptors.push(BuiltinDescriptor { name, func, min_positional, max_positional, required_kwargs, optional_kwargs });
        self.global.insert(name, id);
    }

    fn add_method(
        &mut self,
        tag: Tag,
        name: &'static str,
        func: BuiltinFn,
        min_positional: usize,
        max_positional: Option<usize>,
        required_kwargs: &'static [&'static str],
        optional_kwargs: &'static [&'static str],
    ) {
        let id = self.descriptors.len();
        self.descriptors.push(BuiltinDescriptor { name, func, min_positional, max_positional, required_kwargs, optional_kwargs });
        self.methods.insert((tag, name), id);
    }

    /// Names real Meson exposes that we do not give a body to. Calling one
    /// raises [`VmError::UnimplementedBuiltin`] rather than "not callable",
    /// so a script exercising one of these fails with a specific message
    /// instead of tripping over an unrelated-looking error.
    fn register_stubs(&mut self) {
        const STUB_NAMES: &[&str] = &[
            "add_global_arguments",
            "add_global_link_arguments",
            "add_languages",
            "add_project_arguments",
            "add_project_link_arguments",
            "add_test_setup",
            "benchmark",
            "both_libraries",
            "configuration_data",
            "configure_file",
            "declare_dependency",
            "disabler",
            "environment",
            "find_library",
            "find_program",
            "generator",
            "get_variable",
            "install_data",
            "install_emptydir",
            "install_headers",
            "install_man",
            "install_subdir",
            "install_symlink",
            "is_disabler",
            "jar",
            "range",
            "run_command",
            "set_quoted",
            "shared_module",
            "source_set",
            "vcs_tag",
        ];
        for name in STUB_NAMES {
            self.stub_global.insert(name, ());
        }
    }

    #[must_use]
    pub fn lookup_global(&self, name: &str) -> Option<BuiltinId> {
        self.global.get(name).map(|&i| BuiltinId(i as u32))
    }

    #[must_use]
    pub fn is_stub_global(&self, name: &str) -> bool {
        self.stub_global.contains_key(name)
    }

    /// Every module-level name this table knows, bodied or stub —
    /// `kiln-lsp`'s completion list draws on this instead of hardcoding
    /// its own copy of the builtin name set.
    pub fn global_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.global.keys().copied().chain(self.stub_global.keys().copied())
    }

    #[must_use]
    pub fn lookup_method(&self, tag: Tag, name: &str) -> Option<BuiltinId> {
        self.methods.get(&(tag, name)).map(|&i| BuiltinId(i as u32))
    }

    fn descriptor(&self, id: BuiltinId) -> &BuiltinDescriptor {
        &self.descriptors[id.0 as usize]
    }

    #[must_use]
    pub fn name_of(&self, id: BuiltinId) -> &'static str {
        self.descriptor(id).name
    }

    /// `pop_args`: validates positional arity and keyword-argument names
    /// against the descriptor before the builtin body ever runs. Per-slot
    /// type coercion (listify/glob/typecheck) happens inside each builtin,
    /// which knows its own expected `TypeTag`s; this stage only rejects
    /// shapes no builtin could ever want (wrong count, unknown keyword,
    /// missing required keyword).
    fn validate(&self, id: BuiltinId, positional: &[ObjectHandle], kwargs: &IndexMap<String, ObjectHandle>) -> VmResult<()> {
        let desc = self.descriptor(id);
        let got = positional.len();
        let arity_ok = got >= desc.min_positional && desc.max_positional.is_none_or(|max| got <= max);
        if !arity_ok {
            let expected = match desc.max_positional {
                Some(max) if max == desc.min_positional => format!("{max}"),
                Some(max) => format!("{}..{max}", desc.min_positional),
                None => format!("at least {}", desc.min_positional),
            };
            return Err(VmError::ArityMismatch { expected, got });
        }
        for key in kwargs.keys() {
            if !desc.required_kwargs.contains(&key.as_str()) && !desc.optional_kwargs.contains(&key.as_str()) {
                return Err(VmError::UnexpectedKwarg { name: key.clone() });
            }
        }
        for required in desc.required_kwargs {
            if !kwargs.contains_key(*required) {
                return Err(VmError::MissingKwarg { name: (*required).to_string() });
            }
        }
        Ok(())
    }

    pub fn dispatch(&self, vm: &mut Vm, id: BuiltinId, receiver: Option<ObjectHandle>, positional: Vec<ObjectHandle>, kwargs: IndexMap<String, ObjectHandle>) -> VmResult<ObjectHandle> {
        self.validate(id, &positional, &kwargs)?;
        let func = self.descriptor(id).func;
        func(vm, BuiltinArgs { receiver, positional, kwargs })
    }
}

/// Pulls a string out of a `Str`-tagged handle, the shape almost every
/// builtin's first positional argument takes.
pub(crate) fn expect_str(vm: &Vm, h: ObjectHandle, what: &str) -> VmResult<String> {
    match vm.store.payload_of(h) {
        Some(kiln_collections::Payload::Str(sh)) => Ok(vm.strings.as_str(sh).to_string()),
        _ => Err(VmError::TypeError(format!("{what} must be a string"))),
    }
}

pub(crate) fn expect_array(vm: &Vm, h: ObjectHandle, what: &str) -> VmResult<Vec<ObjectHandle>> {
    match vm.store.array(h) {
        Some(arr) => Ok(arr.iter(&vm.store.array_cells).collect()),
        None => Err(VmError::TypeError(format!("{what} must be an array"))),
    }
}

/// `listify`: a bare scalar becomes a 1-element vec, an array is flattened
/// to its elements — the shape every `sources`/`dependencies`-style
/// variadic-or-array argument takes in real Meson.
pub(crate) fn listify(vm: &Vm, handles: &[ObjectHandle]) -> Vec<ObjectHandle> {
    let mut out = Vec::with_capacity(handles.len());
    for &h in handles {
        match vm.store.array(h) {
            Some(arr) => out.extend(arr.iter(&vm.store.array_cells)),
            None => out.push(h),
        }
    }
    out
}
