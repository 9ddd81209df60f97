//! The bytecode interpreter: a stack of [`CallFrame`]s over a shared
//! object stack, dispatching one [`Opcode`] at a time against the object
//! store every builtin and operator in this crate also shares.
//!
//! There is no separate "interpreter loop" type — [`Vm`] owns everything a
//! running script can touch (the object store, string interner, option
//! table, project model, diagnostics) the way a real Meson `Interpreter`
//! instance does, so a `subdir()` call is just another bytecode unit loaded
//! into the same `Vm` and run to completion.

use indexmap::IndexMap;

use kiln_collections::object::{FeatureState, MachineKind};
use kiln_collections::{ArrayBackbone, DictBackbone, DictKey, ObjectHandle, ObjectStore, Payload, StrHandle, StringInterner, Tag};
use kiln_compiler::{store_flags, Chunk, CompiledUnit, Compiler, FunctionProto, Opcode, ParamProto};
use kiln_diagnostics::{Diagnostic, DiagnosticStore, Level, SourceId};
use kiln_syntax::{LexMode, Parser};
use kiln_types::{ComplexRegistry, TypeTag};

use crate::behavior::{Behavior, RuntimeBehavior};
use crate::builtins::{BuiltinId, BuiltinTable};
use crate::error::{VmError, VmResult};
use crate::frame::{CallFrame, FrameKind};
use crate::model::ProjectModel;
use crate::options::OptionTable;

/// One loaded bytecode unit's chunk plus the function-index base every
/// `ConstantFunc` inside it resolves against (see `func_base` below).
struct ChunkEntry {
    chunk: Chunk,
    func_base: usize,
}

/// A registered user-defined function: its own chunk (every `FunctionProto`
/// owns one, separate from its parent unit's) plus the parameter list
/// `Call` binds arguments against.
struct FuncRuntime {
    name: String,
    params: Vec<ParamProto>,
    chunk_index: usize,
}

/// A bound callable: a builtin id plus the receiver it was resolved against
/// (`None` for a bare module-level function). Every `Member` opcode and
/// every plain `Load` of a global builtin name allocates one of these.
#[derive(Clone, Copy)]
struct Capture {
    receiver: Option<ObjectHandle>,
    builtin: BuiltinId,
}

/// Live state for one `foreach` loop. `DictBig` additionally snapshots the
/// promoted dict's insertion-ordered entries once, since
/// [`kiln_collections::MesonIterator::next_dict_big`] has nothing of its
/// own to walk.
enum LiveIterator {
    Array(kiln_collections::MesonIterator),
    DictSmall(kiln_collections::MesonIterator),
    DictBig { it: kiln_collections::MesonIterator, entries: Vec<(DictKey, ObjectHandle)> },
    TypeInfo(kiln_collections::MesonIterator),
}

impl LiveIterator {
    fn arity(&self) -> usize {
        match self {
            LiveIterator::Array(it) | LiveIterator::DictSmall(it) | LiveIterator::TypeInfo(it) => it.arity(),
            LiveIterator::DictBig { it, .. } => it.arity(),
        }
    }
}

enum NextResult {
    Done,
    One(ObjectHandle),
    Pair(DictKey, ObjectHandle),
    RawType(u64),
}

/// The running interpreter. Shared by ordinary execution and the static
/// analyzer, which installs its own [`Behavior`] in place of
/// [`RuntimeBehavior`] rather than forking this type.
pub struct Vm {
    pub store: ObjectStore,
    pub strings: StringInterner,
    pub diagnostics: DiagnosticStore,
    pub options: OptionTable,
    pub model: ProjectModel,
    pub(crate) builtins: BuiltinTable,

    types: ComplexRegistry,
    /// Side table `Typecheck` consults. Always empty: the current compiler
    /// never emits the operand that would populate it. Reserved for a
    /// future compiler pass that threads explicit type assertions through.
    type_tags: Vec<TypeTag>,

    chunks: Vec<ChunkEntry>,
    functions: Vec<FuncRuntime>,
    captures: Vec<Capture>,
    iterators: Vec<LiveIterator>,
    include_dirs: Vec<Vec<String>>,

    object_stack: Vec<ObjectHandle>,
    frames: Vec<CallFrame>,
    /// Set by `Return`/`ReturnEnd` only when the popped frame was a
    /// `Script` frame; `run_chunk` takes it back out once its own dispatch
    /// loop returns.
    last_script_result: Option<(ObjectHandle, IndexMap<StrHandle, ObjectHandle>)>,
    /// Byte offset of the instruction currently executing, captured before
    /// the dispatch loop advances `ip` past its operands — used for
    /// diagnostic locations.
    current_op_ip: usize,
    /// Chunk the currently executing instruction belongs to, captured
    /// alongside `current_op_ip` — a branch inside a function body needs
    /// this to resolve back to a source location after the run.
    current_chunk_index: usize,

    behavior: Box<dyn Behavior>,

    current_source_dir: String,
    current_build_dir: String,
    next_source_id: u32,
}

fn resolve_type_name(name: &str) -> Option<TypeTag> {
    match name {
        "str" | "string" => Some(TypeTag::simple(Tag::Str)),
        "int" | "integer" => Some(TypeTag::simple(Tag::Num)),
        "bool" | "boolean" => Some(TypeTag::simple(Tag::Bool)),
        "list" | "array" => Some(TypeTag::simple(Tag::Array)),
        "dict" => Some(TypeTag::simple(Tag::Dict)),
        _ => None,
    }
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(Box::new(RuntimeBehavior))
    }

    #[must_use]
    pub fn with_behavior(behavior: Box<dyn Behavior>) -> Self {
        Self {
            store: ObjectStore::new(),
            strings: StringInterner::new(),
            diagnostics: DiagnosticStore::new(),
            options: OptionTable::with_standard_options(),
            model: ProjectModel::default(),
            builtins: BuiltinTable::new(),
            types: ComplexRegistry::new(),
            type_tags: Vec::new(),
            chunks: Vec::new(),
            functions: Vec::new(),
            captures: Vec::new(),
            iterators: Vec::new(),
            include_dirs: Vec::new(),
            object_stack: Vec::new(),
            frames: Vec::new(),
            last_script_result: None,
            current_op_ip: 0,
            current_chunk_index: 0,
            behavior,
            current_source_dir: String::new(),
            current_build_dir: String::new(),
            next_source_id: 0,
        }
    }

    /// Number of chunks registered so far (the top-level script chunk
    /// plus one per compiled function) — the analyzer's dead-code pass
    /// walks every one of these looking for instructions `on_instruction`
    /// never reported.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Every instruction's starting offset within `chunk_index`, in
    /// order, decoded the same way the dispatch loop itself does.
    #[must_use]
    pub fn chunk_instruction_offsets(&self, chunk_index: usize) -> Vec<usize> {
        let code = &self.chunks[chunk_index].chunk.code;
        let mut offsets = Vec::new();
        let mut ip = 0;
        while ip < code.len() {
            offsets.push(ip);
            let op = Opcode::from_u8(code[ip]).expect("compiler never emits an invalid opcode byte");
            ip += 1 + op.operand_count() as usize * 3;
        }
        offsets
    }

    /// Source location for one instruction offset within `chunk_index`,
    /// the same lookup `current_location` does for the active frame.
    #[must_use]
    pub fn chunk_location_for(&self, chunk_index: usize, ip: usize) -> Option<(SourceId, u32)> {
        self.chunks[chunk_index].chunk.location_for(ip as u32)
    }

    /// Every module-level builtin name, bodied or stub — completion's
    /// global-function candidates without duplicating the name list.
    pub fn builtin_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.global_names()
    }

    /// Sets the root `(source_dir, build_dir)` pair `subdir()` resolves
    /// nested paths against. A fresh `Vm` starts with both empty, which is
    /// fine for a one-shot `eval`/`repl` snippet with no `subdir()` calls;
    /// a driver evaluating an actual top-level `meson.build` must call
    /// this first so the first `subdir()` call resolves relative to the
    /// project root instead of an empty prefix.
    pub fn set_directories(&mut self, source_dir: impl Into<String>, build_dir: impl Into<String>) {
        self.current_source_dir = source_dir.into();
        self.current_build_dir = build_dir.into();
    }

    /// Exposes the installed behavior for a driver to downcast via
    /// [`Behavior::as_any`] once the run is finished (`kiln-analyzer`
    /// recovers its own findings this way; ordinary runtime evaluation
    /// never needs this).
    #[must_use]
    pub fn behavior(&self) -> &dyn Behavior {
        self.behavior.as_ref()
    }

    /// Runs a freshly compiled top-level unit to completion, seeding the
    /// well-known globals (`meson`, `host_machine`, …) once before the
    /// first instruction executes.
    pub fn run_unit(&mut self, unit: CompiledUnit) -> VmResult<ObjectHandle> {
        let mut scope = IndexMap::new();
        self.seed_globals(&mut scope);
        let (value, _scope) = self.run_unit_in_scope(unit, scope)?;
        Ok(value)
    }

    /// Like [`Vm::run_unit`] but continues from a caller-supplied scope
    /// instead of reseeding the well-known globals — a REPL's
    /// variable-persistence path, where each line is its own compiled
    /// unit but later lines must see earlier lines' assignments.
    pub fn run_unit_in_scope(
        &mut self,
        unit: CompiledUnit,
        scope: IndexMap<StrHandle, ObjectHandle>,
    ) -> VmResult<(ObjectHandle, IndexMap<StrHandle, ObjectHandle>)> {
        let chunk_index = self.load_unit(unit);
        self.run_chunk(chunk_index, scope)
    }

    /// Builds a fresh seed scope with the well-known globals (`meson`,
    /// `host_machine`, …) bound, without running anything. A REPL's first
    /// line feeds this to [`Vm::run_unit_in_scope`]; every later line
    /// feeds back the scope the previous line finished with instead.
    #[must_use]
    pub fn seeded_scope(&mut self) -> IndexMap<StrHandle, ObjectHandle> {
        let mut scope = IndexMap::new();
        self.seed_globals(&mut scope);
        scope
    }

    /// Registers a compiled unit's function protos and top-level chunk,
    /// returning the chunk index to pass to [`Vm::run_chunk`].
    ///
    /// Every `FunctionProto` gets its own `ChunkEntry` sharing the unit's
    /// `func_base`, so a `CallFrame`'s `chunk_index` alone is enough to
    /// recover both "what code runs" and "what `ConstantFunc` inside it
    /// resolves against" — no parallel per-frame `func_base` stack needed.
    fn load_unit(&mut self, unit: CompiledUnit) -> usize {
        let func_base = self.functions.len();
        for proto in unit.functions {
            let chunk_index = self.chunks.len();
            self.chunks.push(ChunkEntry { chunk: proto.chunk, func_base });
            self.functions.push(FuncRuntime { name: proto.name, params: proto.params, chunk_index });
        }
        let script_chunk_index = self.chunks.len();
        self.chunks.push(ChunkEntry { chunk: unit.chunk, func_base });
        script_chunk_index
    }

    fn seed_globals(&mut self, scope: &mut IndexMap<StrHandle, ObjectHandle>) {
        let meson_key = self.strings.make_str("meson");
        scope.insert(meson_key, ObjectHandle::MESON);
        let host = self.store.alloc_machine_kind(MachineKind::Host);
        let build = self.store.alloc_machine_kind(MachineKind::Build);
        let host_key = self.strings.make_str("host_machine");
        scope.insert(host_key, host);
        let build_key = self.strings.make_str("build_machine");
        scope.insert(build_key, build);
        // Cross-compilation's separate target triple is out of scope; the
        // target machine presents as the host.
        let target_key = self.strings.make_str("target_machine");
        scope.insert(target_key, host);
    }

    /// Runs `chunk_index` as a fresh `Script` frame seeded with
    /// `seed_scope`, returning its result value and the scope it finished
    /// with (so `subdir`/`subproject` can fold bindings back into the
    /// caller). Re-entrant: called recursively from [`Vm::run_subdir`]
    /// while an outer `run_chunk` is itself mid-dispatch.
    pub fn run_chunk(&mut self, chunk_index: usize, seed_scope: IndexMap<StrHandle, ObjectHandle>) -> VmResult<(ObjectHandle, IndexMap<StrHandle, ObjectHandle>)> {
        let stack_base = self.object_stack.len();
        self.frames.push(CallFrame::script(chunk_index, seed_scope, stack_base));
        let base_frame_len = self.frames.len() - 1;
        self.dispatch_until(base_frame_len)?;
        Ok(self.last_script_result.take().expect("a script frame reaching base_frame_len always sets last_script_result"))
    }

    /// Reads, parses, and compiles `{current_source_dir}/{name}/meson.build`,
    /// runs it inheriting the caller's current scope, and folds the
    /// finished scope back in — the scope-inlining real Meson's `subdir()`
    /// does instead of an ordinary function call.
    ///
    /// Reads directly through `std::fs` rather than a virtual filesystem
    /// abstraction; a real build system would need to intercept this for
    /// sandboxing and dependency tracking, which is out of scope here.
    pub fn run_subdir(&mut self, name: &str) -> VmResult<()> {
        let source_dir = format!("{}/{name}", self.current_source_dir.trim_end_matches('/'));
        let build_dir = format!("{}/{name}", self.current_build_dir.trim_end_matches('/'));
        let path = format!("{source_dir}/meson.build");
        let text = std::fs::read_to_string(&path).map_err(|e| VmError::Custom(format!("cannot read {path}: {e}")))?;

        let source_id = SourceId::from_raw(self.next_source_id);
        self.next_source_id += 1;

        let (root, ast) = Parser::new(&text, LexMode::Normal).parse().map_err(|e| VmError::Custom(format!("{path}: parse error: {e:?}")))?;
        let unit =
            Compiler::compile(&ast, root, &mut self.store, &mut self.strings, source_id).map_err(|e| VmError::Custom(format!("{path}: compile error: {e:?}")))?;
        let chunk_index = self.load_unit(unit);

        let seed_scope = self.frames.last().expect("run_subdir called with no active frame").scope.clone();

        let saved_source_dir = std::mem::replace(&mut self.current_source_dir, source_dir);
        let saved_build_dir = std::mem::replace(&mut self.current_build_dir, build_dir);
        let result = self.run_chunk(chunk_index, seed_scope);
        self.current_source_dir = saved_source_dir;
        self.current_build_dir = saved_build_dir;

        let (_, final_scope) = result?;
        self.frames.last_mut().expect("frame still present after run_chunk returns").scope = final_scope;
        Ok(())
    }

    /// `(source, offset)` for the instruction currently executing, used by
    /// `message`/`warning`/`error`/`summary` to stamp their diagnostics.
    #[must_use]
    pub fn current_location(&self) -> (SourceId, usize) {
        let frame = self.frames.last().expect("current_location called with no active frame");
        let entry = &self.chunks[frame.chunk_index];
        match entry.chunk.location_for(self.current_op_ip as u32) {
            Some((source, offset)) => (source, offset as usize),
            None => (SourceId::from_raw(0), 0),
        }
    }

    pub fn alloc_str_value(&mut self, s: &str) -> ObjectHandle {
        let sh = self.strings.make_str(s);
        self.store.alloc_str(sh)
    }

    pub fn alloc_option_value(&mut self, value: &crate::options::OptionValue) -> ObjectHandle {
        use crate::options::{Feature, OptionValue};
        match value {
            OptionValue::String(s) => self.alloc_str_value(s),
            OptionValue::Boolean(b) => self.store.alloc_bool(*b),
            OptionValue::Integer(n) => self.store.alloc_num(*n),
            OptionValue::Array(items) => {
                let mut backbone = ArrayBackbone::empty();
                for item in items {
                    let h = self.alloc_str_value(item);
                    backbone.push(&mut self.store.array_cells, h);
                }
                self.store.alloc_array(backbone)
            }
            OptionValue::Feature(f) => {
                let state = match f {
                    Feature::Auto => FeatureState::Auto,
                    Feature::Enabled => FeatureState::Enabled,
                    Feature::Disabled => FeatureState::Disabled,
                };
                self.store.alloc_feature_option(state)
            }
        }
    }

    pub fn alloc_include_directory(&mut self, paths: Vec<String>) -> ObjectHandle {
        let slot = self.include_dirs.len() as u32;
        self.include_dirs.push(paths);
        self.store.alloc_ext(Tag::IncludeDirectory, slot)
    }

    /// Extracts the slot out of an `Ext`-tagged domain object (a
    /// `BuildTarget`, `Dependency`, …). Every call site only ever passes a
    /// receiver it already validated the tag of.
    #[must_use]
    pub fn ext_slot(&self, handle: ObjectHandle) -> u32 {
        match self.store.payload_of(handle) {
            Some(Payload::Ext(slot)) => slot,
            other => unreachable!("ext_slot called on a non-Ext payload: {other:?}"),
        }
    }

    fn lookup_by_handle(&self, sh: StrHandle) -> Option<ObjectHandle> {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.scope.get(&sh) {
                return Some(*v);
            }
        }
        None
    }

    #[must_use]
    pub fn lookup_global(&mut self, name: &str) -> Option<ObjectHandle> {
        let sh = self.strings.make_str(name);
        self.lookup_by_handle(sh)
    }

    pub fn store_global(&mut self, name: &str, value: ObjectHandle) {
        let sh = self.strings.make_str(name);
        self.frames.last_mut().expect("store_global called with no active frame").scope.insert(sh, value);
    }

    fn alloc_capture(&mut self, receiver: Option<ObjectHandle>, builtin: BuiltinId) -> ObjectHandle {
        let slot = self.captures.len() as u32;
        self.captures.push(Capture { receiver, builtin });
        self.store.alloc_capture(slot)
    }

    fn push(&mut self, h: ObjectHandle) {
        self.object_stack.push(h);
    }

    fn pop(&mut self) -> ObjectHandle {
        self.object_stack.pop().expect("bytecode popped an empty object stack")
    }

    fn record_error(&mut self, err: &VmError) {
        let (source, offset) = if self.frames.is_empty() { (SourceId::from_raw(0), 0) } else { self.current_location() };
        self.diagnostics.push(Diagnostic::new(Level::Error, source, offset, err.to_string()));
    }

    /// Runs frames until the frame stack depth returns to `base_frame_len`
    /// (the depth just before the entry frame was pushed) — i.e. until that
    /// entry frame, and everything called from it, has returned.
    fn dispatch_until(&mut self, base_frame_len: usize) -> VmResult<()> {
        loop {
            if self.frames.len() <= base_frame_len {
                return Ok(());
            }
            let (chunk_index, ip) = {
                let frame = self.frames.last().expect("loop guard ensures a frame is present");
                (frame.chunk_index, frame.ip)
            };
            let op_byte = self.chunks[chunk_index].chunk.code[ip];
            let op = Opcode::from_u8(op_byte).expect("compiler never emits an invalid opcode byte");
            let n = op.operand_count() as usize;
            let mut operands = [0u32; 3];
            for (i, slot) in operands.iter_mut().enumerate().take(n) {
                *slot = self.chunks[chunk_index].chunk.read_u24(ip + 1 + i * 3);
            }
            self.current_op_ip = ip;
            self.current_chunk_index = chunk_index;
            self.behavior.on_instruction(chunk_index, ip);
            self.frames.last_mut().expect("loop guard ensures a frame is present").ip = ip + 1 + n * 3;

            if let Err(e) = self.exec_one(op, operands) {
                self.record_error(&e);
                return Err(e);
            }
        }
    }

    fn jump_to(&mut self, target: u32) {
        self.frames.last_mut().expect("jump executed with no active frame").ip = target as usize;
    }

    fn str_payload(&self, h: ObjectHandle) -> Option<StrHandle> {
        match self.store.payload_of(h) {
            Some(Payload::Str(sh)) => Some(sh),
            _ => None,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn exec_one(&mut self, op: Opcode, operands: [u32; 3]) -> VmResult<()> {
        match op {
            Opcode::Pop => {
                self.pop();
                Ok(())
            }
            Opcode::Dup => {
                let top = *self.object_stack.last().expect("dup on an empty object stack");
                self.push(top);
                Ok(())
            }
            Opcode::Swap => {
                let len = self.object_stack.len();
                self.object_stack.swap(len - 1, len - 2);
                Ok(())
            }

            Opcode::Constant => {
                self.push(ObjectHandle(operands[0]));
                Ok(())
            }
            Opcode::ConstantList => {
                let n = operands[0] as usize;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.pop());
                }
                items.reverse();
                let mut backbone = ArrayBackbone::empty();
                for item in items {
                    backbone.push(&mut self.store.array_cells, item);
                }
                let h = self.store.alloc_array(backbone);
                self.push(h);
                Ok(())
            }
            Opcode::ConstantDict => {
                let n = operands[0] as usize;
                let mut pairs = Vec::with_capacity(n);
                for _ in 0..n {
                    let value = self.pop();
                    let key = self.pop();
                    pairs.push((key, value));
                }
                pairs.reverse();
                let mut backbone = DictBackbone::empty();
                for (key_h, value) in pairs {
                    let key = self.dict_key_of(key_h)?;
                    backbone.set(&mut self.store.dict_cells, key, value);
                }
                let h = self.store.alloc_dict(backbone);
                self.push(h);
                Ok(())
            }
            Opcode::ConstantFunc => {
                // The defaults dict the compiler always pushes just ahead
                // of `ConstantFunc`: parameter defaults aren't threaded
                // through `FunctionProto`, so there's nothing to keep.
                self.pop();
                let chunk_index = self.frames.last().expect("ConstantFunc executed with no active frame").chunk_index;
                let func_base = self.chunks[chunk_index].func_base;
                let global_idx = func_base + operands[0] as usize;
                let h = self.store.alloc_funcdef(global_idx as u32);
                self.push(h);
                Ok(())
            }

            Opcode::Add => {
                let b = self.pop();
                let a = self.pop();
                let r = crate::ops::add(&mut self.store, &mut self.strings, a, b)?;
                self.push(r);
                Ok(())
            }
            Opcode::Sub => {
                let b = self.pop();
                let a = self.pop();
                let r = crate::ops::sub(&mut self.store, a, b)?;
                self.push(r);
                Ok(())
            }
            Opcode::Mul => {
                let b = self.pop();
                let a = self.pop();
                let r = crate::ops::mul(&mut self.store, a, b)?;
                self.push(r);
                Ok(())
            }
            Opcode::Div => {
                let b = self.pop();
                let a = self.pop();
                let r = crate::ops::div(&mut self.store, &mut self.strings, a, b)?;
                self.push(r);
                Ok(())
            }
            Opcode::Mod => {
                let b = self.pop();
                let a = self.pop();
                let r = crate::ops::modulo(&mut self.store, a, b)?;
                self.push(r);
                Ok(())
            }
            Opcode::Eq | Opcode::Neq => {
                let b = self.pop();
                let a = self.pop();
                if matches!(self.store.tag_of(a), Some(Tag::Str)) && matches!(self.store.tag_of(b), Some(Tag::Str)) && crate::ops::looks_like_version_compare(&self.store, &self.strings, a, b) {
                    let (source, offset) = self.current_location();
                    self.diagnostics.push(Diagnostic::new(
                        Level::Warning,
                        source,
                        offset,
                        "comparing version-like strings with '=='/'!='; did you mean version_compare()?".to_string(),
                    ));
                }
                let equal = crate::ops::values_equal(&self.store, &self.strings, a, b);
                let result = if op == Opcode::Eq { equal } else { !equal };
                let h = self.store.alloc_bool(result);
                self.push(h);
                Ok(())
            }
            Opcode::Lt => self.exec_compare(|o| o == std::cmp::Ordering::Less),
            Opcode::Gt => self.exec_compare(|o| o == std::cmp::Ordering::Greater),
            Opcode::Leq => self.exec_compare(|o| o != std::cmp::Ordering::Greater),
            Opcode::Geq => self.exec_compare(|o| o != std::cmp::Ordering::Less),
            Opcode::In | Opcode::NotIn => {
                let haystack = self.pop();
                let needle = self.pop();
                let found = crate::ops::contains(&self.store, &self.strings, needle, haystack)?;
                let result = if op == Opcode::In { found } else { !found };
                let h = self.store.alloc_bool(result);
                self.push(h);
                Ok(())
            }
            Opcode::Not => {
                let a = self.pop();
                let h = crate::ops::not(&mut self.store, &self.strings, a);
                self.push(h);
                Ok(())
            }
            Opcode::Negate => {
                let a = self.pop();
                let h = crate::ops::negate(&mut self.store, a)?;
                self.push(h);
                Ok(())
            }
            Opcode::Stringify => {
                let a = self.pop();
                let h = crate::ops::stringify(&mut self.store, &mut self.strings, a);
                self.push(h);
                Ok(())
            }

            Opcode::Load => self.exec_load(operands[0]),
            Opcode::TryLoad => {
                let sh = self.name_operand(operands[0])?;
                if let Some(v) = self.lookup_by_handle(sh) {
                    self.push(v);
                } else {
                    self.jump_to(operands[1]);
                }
                Ok(())
            }
            Opcode::Store => self.exec_store(operands[0], operands[1]),

            Opcode::Index => self.exec_index(),
            Opcode::IndexSet => self.exec_index_set(),

            Opcode::Jmp => {
                self.jump_to(operands[0]);
                Ok(())
            }
            Opcode::JmpIfFalse => {
                let v = self.pop();
                let cond = crate::ops::truthy(&self.store, &self.strings, v);
                let ip = self.current_op_ip;
                self.behavior.on_branch_taken(self.current_chunk_index, ip, !cond);
                if !cond {
                    self.jump_to(operands[0]);
                }
                Ok(())
            }
            Opcode::JmpIfTrue => {
                let v = self.pop();
                let cond = crate::ops::truthy(&self.store, &self.strings, v);
                let ip = self.current_op_ip;
                self.behavior.on_branch_taken(self.current_chunk_index, ip, cond);
                if cond {
                    self.jump_to(operands[0]);
                }
                Ok(())
            }
            Opcode::JmpIfDisabler => {
                let v = self.pop();
                if self.store.tag_of(v) == Some(Tag::Disabler) {
                    self.jump_to(operands[0]);
                }
                Ok(())
            }
            Opcode::JmpIfDisablerKeep => {
                let v = *self.object_stack.last().expect("JmpIfDisablerKeep on an empty object stack");
                if self.store.tag_of(v) == Some(Tag::Disabler) {
                    self.jump_to(operands[0]);
                }
                Ok(())
            }

            Opcode::Iterator => self.exec_iterator(operands[0]),
            Opcode::IteratorNext => self.exec_iterator_next(operands[0]),

            Opcode::Call => self.exec_call(operands[0], operands[1]),
            Opcode::CallNative => Err(VmError::Custom("call_native is reserved for a future compiler fast path and is not implemented".to_string())),
            Opcode::Member => self.exec_member(operands[0]),

            Opcode::Return => {
                let value = self.pop();
                self.finish_frame(value)
            }
            Opcode::ReturnEnd => self.finish_frame(ObjectHandle::NONE),

            Opcode::Typecheck => {
                if let Some(&expected) = self.type_tags.get(operands[0] as usize) {
                    let top = *self.object_stack.last().expect("Typecheck on an empty object stack");
                    if kiln_types::typecheck(&self.store, &self.types, top, expected).is_err() {
                        return Err(VmError::TypeError("typecheck failed".to_string()));
                    }
                }
                Ok(())
            }

            Opcode::DbgBreak => {
                let ip = self.current_op_ip;
                self.behavior.on_breakpoint(ip);
                Ok(())
            }
            Opcode::AzBranch => {
                self.behavior.on_az_branch();
                Ok(())
            }
            Opcode::AzMerge => {
                self.behavior.on_az_merge();
                Ok(())
            }
        }
    }

    fn exec_compare(&mut self, want: fn(std::cmp::Ordering) -> bool) -> VmResult<()> {
        let b = self.pop();
        let a = self.pop();
        let ordering = crate::ops::compare(&self.store, &self.strings, a, b)?;
        let h = self.store.alloc_bool(want(ordering));
        self.push(h);
        Ok(())
    }

    /// Unwraps a `Constant`-style operand that names an identifier: these
    /// are handles into the shared object store pointing at a `Str`
    /// payload, not raw `StrHandle`s, the same encoding `Constant` uses for
    /// every other literal.
    fn name_operand(&self, operand: u32) -> VmResult<StrHandle> {
        self.str_payload(ObjectHandle(operand)).ok_or_else(|| VmError::TypeError("identifier operand did not reference a string constant".to_string()))
    }

    fn dict_key_of(&self, h: ObjectHandle) -> VmResult<DictKey> {
        match self.store.payload_of(h) {
            Some(Payload::Str(sh)) => Ok(DictKey::Str(sh)),
            Some(Payload::Num(n)) => Ok(DictKey::Int(n)),
            _ => Err(VmError::TypeError("dict key must be a string or integer".to_string())),
        }
    }

    fn exec_load(&mut self, operand: u32) -> VmResult<()> {
        let sh = self.name_operand(operand)?;
        if let Some(v) = self.lookup_by_handle(sh) {
            let name = self.strings.as_str(sh).to_string();
            self.behavior.on_load(&name);
            self.push(v);
            return Ok(());
        }
        let name = self.strings.as_str(sh).to_string();
        if let Some(id) = self.builtins.lookup_global(&name) {
            let h = self.alloc_capture(None, id);
            self.push(h);
            return Ok(());
        }
        if self.builtins.is_stub_global(&name) {
            return Err(VmError::UnimplementedBuiltin(name));
        }
        Err(VmError::UndefinedVariable { name })
    }

    fn exec_store(&mut self, flags: u32, name_operand: u32) -> VmResult<()> {
        if flags & store_flags::MEMBER != 0 {
            let name_h = self.pop();
            let container_h = self.pop();
            let value_h = self.pop();
            let name = self.str_payload(name_h).map(|sh| self.strings.as_str(sh).to_string()).ok_or_else(|| VmError::TypeError("member name must be a string".to_string()))?;
            match self.store.tag_of(container_h) {
                Some(Tag::Dict) => {
                    let key_sh = self.strings.make_str(&name);
                    let idx = match self.store.payload_of(container_h) {
                        Some(Payload::Dict(idx)) => idx,
                        _ => unreachable!("tag_of reported Dict"),
                    };
                    if let Some(backbone) = self.store.dicts.get_mut(idx as usize) {
                        backbone.set(&mut self.store.dict_cells, DictKey::Str(key_sh), value_h);
                    }
                    Ok(())
                }
                Some(other) => Err(VmError::NotAssignable { tag: other }),
                None => Err(VmError::NotAssignable { tag: Tag::None }),
            }
        } else {
            let value_h = self.pop();
            let sh = self.name_operand(name_operand)?;
            let name = self.strings.as_str(sh).to_string();
            self.mark_cow_on_bind(value_h);
            self.frames.last_mut().expect("Store executed with no active frame").scope.insert(sh, value_h);
            let (source, offset) = self.current_location();
            self.behavior.on_store(&name, value_h, source, offset);
            Ok(())
        }
    }

    /// Binding an array/dict value to a name is exactly the point `b = a`
    /// aliases two names onto the same cell chain; flagging the backbone
    /// `cow` here means whichever side mutates first (`ops::add`'s
    /// shallow-copied result, `exec_index_set`) deep-copies before writing
    /// instead of splicing into cells the other name still walks.
    fn mark_cow_on_bind(&mut self, value_h: ObjectHandle) {
        match self.store.tag_of(value_h) {
            Some(Tag::Array) => {
                if let Some(backbone) = self.store.array_mut(value_h) {
                    backbone.mark_cow();
                }
            }
            Some(Tag::Dict) => {
                if let Some(backbone) = self.store.dict_mut(value_h) {
                    backbone.mark_cow();
                }
            }
            _ => {}
        }
    }

    fn exec_index(&mut self) -> VmResult<()> {
        let key_h = self.pop();
        let container_h = self.pop();
        let result = match self.store.tag_of(container_h) {
            Some(Tag::Array) => {
                let idx = match self.store.payload_of(key_h) {
                    Some(Payload::Num(n)) => n,
                    _ => return Err(VmError::TypeError("array index must be a number".to_string())),
                };
                let arr = self.store.array(container_h).expect("tag_of reported Array");
                let len = arr.len() as i64;
                let resolved = if idx < 0 { idx + len } else { idx };
                if resolved < 0 || resolved >= len {
                    return Err(VmError::IndexOutOfRange);
                }
                arr.get(&self.store.array_cells, resolved as usize).expect("bounds checked above")
            }
            Some(Tag::Dict) => {
                let key = self.dict_key_of(key_h)?;
                let dict = self.store.dict(container_h).expect("tag_of reported Dict");
                dict.get(&self.store.dict_cells, key).ok_or(VmError::IndexOutOfRange)?
            }
            _ => return Err(VmError::BadOperandTypes { op: "[]" }),
        };
        self.push(result);
        Ok(())
    }

    /// Array elements have no in-place index-assignment primitive (real
    /// Meson doesn't support `arr[i] = v` either); only dicts accept
    /// `IndexSet`.
    fn exec_index_set(&mut self) -> VmResult<()> {
        let key_h = self.pop();
        let container_h = self.pop();
        let value_h = self.pop();
        match self.store.tag_of(container_h) {
            Some(Tag::Dict) => {
                let key = self.dict_key_of(key_h)?;
                let idx = match self.store.payload_of(container_h) {
                    Some(Payload::Dict(idx)) => idx,
                    _ => unreachable!("tag_of reported Dict"),
                };
                if let Some(backbone) = self.store.dicts.get_mut(idx as usize) {
                    backbone.set(&mut self.store.dict_cells, key, value_h);
                }
                Ok(())
            }
            Some(other) => Err(VmError::NotAssignable { tag: other }),
            None => Err(VmError::NotAssignable { tag: Tag::None }),
        }
    }

    fn exec_member(&mut self, operand: u32) -> VmResult<()> {
        let receiver_h = self.pop();
        let sh = self.name_operand(operand)?;
        let name = self.strings.as_str(sh).to_string();
        let tag = self.store.tag_of(receiver_h).unwrap_or(Tag::None);
        match self.builtins.lookup_method(tag, &name) {
            Some(id) => {
                let h = self.alloc_capture(Some(receiver_h), id);
                self.push(h);
                Ok(())
            }
            None => Err(VmError::NoSuchMember { name: format!("{tag:?}").to_lowercase(), member: name }),
        }
    }

    fn exec_iterator(&mut self, nvars: u32) -> VmResult<()> {
        let iterable = self.pop();
        let live = match self.store.tag_of(iterable) {
            Some(Tag::Array) => {
                let arr = self.store.array(iterable).expect("tag_of reported Array");
                LiveIterator::Array(kiln_collections::MesonIterator::over_array(arr))
            }
            Some(Tag::Dict) => {
                let dict = self.store.dict(iterable).expect("tag_of reported Dict");
                if dict.is_promoted() {
                    let entries = dict.entries(&self.store.dict_cells);
                    LiveIterator::DictBig { it: kiln_collections::MesonIterator::over_big_dict(), entries }
                } else {
                    LiveIterator::DictSmall(kiln_collections::MesonIterator::over_small_dict(dict))
                }
            }
            Some(Tag::TypeInfo) => {
                let tag_bits = match self.store.payload_of(iterable) {
                    Some(Payload::TypeInfo(bits)) => bits,
                    _ => unreachable!("tag_of reported TypeInfo"),
                };
                LiveIterator::TypeInfo(kiln_collections::MesonIterator::over_typeinfo(vec![tag_bits]))
            }
            other => return Err(VmError::NotIterable(format!("{other:?}"))),
        };
        let expected = nvars as usize;
        let got = live.arity();
        if got != expected {
            return Err(VmError::IteratorArityMismatch { expected, got });
        }
        let impure = matches!(live, LiveIterator::TypeInfo(_));
        let slot = self.iterators.len() as u32;
        self.iterators.push(live);
        let handle = self.store.alloc_iterator(slot);
        self.push(handle);
        self.behavior.on_loop_enter(impure);
        Ok(())
    }

    /// Peeks (never pops) the iterator left on the stack by `Iterator`, so
    /// the loop body's own `Store`s see it underneath their values and the
    /// next `IteratorNext` can find it again.
    fn exec_iterator_next(&mut self, break_target: u32) -> VmResult<()> {
        let top = *self.object_stack.last().expect("IteratorNext: iterator stays on the stack under the loop");
        let slot = match self.store.payload_of(top) {
            Some(Payload::Iterator(slot)) => slot,
            _ => return Err(VmError::TypeError("IteratorNext executed without a live iterator on the stack".to_string())),
        };
        let result = match &mut self.iterators[slot as usize] {
            LiveIterator::Array(it) => match it.next_array(&self.store.array_cells) {
                Some(kiln_collections::Step::One(h)) => NextResult::One(h),
                _ => NextResult::Done,
            },
            LiveIterator::DictSmall(it) => match it.next_dict_small(&self.store.dict_cells) {
                Some(kiln_collections::Step::Two(k, v)) => NextResult::Pair(k, v),
                _ => NextResult::Done,
            },
            LiveIterator::DictBig { it, entries } => match it.next_dict_big(entries) {
                Some(kiln_collections::Step::Two(k, v)) => NextResult::Pair(k, v),
                _ => NextResult::Done,
            },
            LiveIterator::TypeInfo(it) => match it.next_typeinfo() {
                Some(tag) => NextResult::RawType(tag),
                None => NextResult::Done,
            },
        };
        match result {
            NextResult::Done => {
                self.behavior.on_loop_exit();
                self.jump_to(break_target);
            }
            NextResult::One(h) => self.push(h),
            NextResult::Pair(key, value) => {
                let key_h = match key {
                    DictKey::Str(sh) => self.store.alloc_str(sh),
                    DictKey::Int(n) => self.store.alloc_num(n),
                };
                self.push(key_h);
                self.push(value);
            }
            NextResult::RawType(tag) => {
                let h = self.store.alloc_typeinfo(tag);
                self.push(h);
            }
        }
        Ok(())
    }

    fn exec_call(&mut self, nargs: u32, nkwargs: u32) -> VmResult<()> {
        let mut kwargs = IndexMap::new();
        for _ in 0..nkwargs {
            let key_h = self.pop();
            let value = self.pop();
            let key = self.str_payload(key_h).map(|sh| self.strings.as_str(sh).to_string()).ok_or_else(|| VmError::TypeError("keyword argument name must be a string".to_string()))?;
            kwargs.insert(key, value);
        }
        let mut positional = Vec::with_capacity(nargs as usize);
        for _ in 0..nargs {
            positional.push(self.pop());
        }
        positional.reverse();
        let callee = self.pop();

        match self.store.tag_of(callee) {
            Some(Tag::Capture) => {
                let slot = match self.store.payload_of(callee) {
                    Some(Payload::Capture(slot)) => slot,
                    _ => unreachable!("tag_of reported Capture"),
                };
                let cap = self.captures[slot as usize];
                let builtins = std::mem::take(&mut self.builtins);
                let result = builtins.dispatch(self, cap.builtin, cap.receiver, positional, kwargs);
                self.builtins = builtins;
                self.push(result?);
                Ok(())
            }
            Some(Tag::FuncDef) => {
                let slot = match self.store.payload_of(callee) {
                    Some(Payload::FuncDef(slot)) => slot,
                    _ => unreachable!("tag_of reported FuncDef"),
                };
                self.call_user_function(slot, positional, kwargs)
            }
            _ => Err(VmError::NotCallable),
        }
    }

    fn call_user_function(&mut self, slot: u32, positional: Vec<ObjectHandle>, kwargs: IndexMap<String, ObjectHandle>) -> VmResult<()> {
        let (chunk_index, name, params) = {
            let func = &self.functions[slot as usize];
            (func.chunk_index, func.name.clone(), func.params.clone())
        };
        if positional.len() > params.len() {
            return Err(VmError::ArityMismatch { expected: params.len().to_string(), got: positional.len() });
        }
        let mut scope = IndexMap::new();
        for (i, param) in params.iter().enumerate() {
            let value = if let Some(&v) = positional.get(i) {
                v
            } else if let Some(&v) = kwargs.get(&param.name) {
                v
            } else {
                return Err(VmError::MissingKwarg { name: param.name.clone() });
            };
            if let Some(type_name) = &param.type_name {
                if let Some(expected) = resolve_type_name(type_name) {
                    if kiln_types::typecheck(&self.store, &self.types, value, expected).is_err() {
                        return Err(VmError::TypeError(format!("argument '{}' to '{name}' has the wrong type", param.name)));
                    }
                }
            }
            let key = self.strings.make_str(&param.name);
            self.mark_cow_on_bind(value);
            scope.insert(key, value);
        }
        let stack_base = self.object_stack.len();
        self.frames.push(CallFrame::function(chunk_index, name, scope, None, stack_base));
        Ok(())
    }

    fn finish_frame(&mut self, value: ObjectHandle) -> VmResult<()> {
        let frame = self.frames.pop().expect("finish_frame called with no active frame");
        self.object_stack.truncate(frame.stack_base);
        match frame.kind {
            FrameKind::Function => self.object_stack.push(value),
            FrameKind::Script => self.last_script_result = Some((value, frame.scope)),
        }
        Ok(())
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> (Vm, IndexMap<StrHandle, ObjectHandle>) {
        let mut vm = Vm::new();
        let (root, ast) = Parser::new(text, LexMode::Normal).parse().unwrap();
        let unit = Compiler::compile(&ast, root, &mut vm.store, &mut vm.strings, SourceId::from_raw(0)).unwrap();
        let scope = vm.seeded_scope();
        let (_, scope) = vm.run_unit_in_scope(unit, scope).unwrap();
        (vm, scope)
    }

    /// `a`'s `+=` must not retroactively mutate a value `b` aliased from an
    /// earlier state of `a`.
    #[test]
    fn plus_assign_does_not_mutate_an_earlier_alias() {
        let (mut vm, scope) = eval("a = [1, 2]\na += 3\nb = a\na += 4\n");
        let b_sh = vm.strings.make_str("b");
        let b_handle = *scope.get(&b_sh).unwrap();
        assert_eq!(crate::ops::display(&vm.store, &vm.strings, b_handle), "['1', '2', '3']");
        let a_sh = vm.strings.make_str("a");
        let a_handle = *scope.get(&a_sh).unwrap();
        assert_eq!(crate::ops::display(&vm.store, &vm.strings, a_handle), "['1', '2', '3', '4']");
    }

    #[test]
    fn dict_merge_does_not_mutate_an_earlier_alias() {
        let (mut vm, scope) = eval("d = {'a': 1}\nd += {'b': 2}\ne = d\nd += {'c': 3}\n");
        let e_sh = vm.strings.make_str("e");
        let e_handle = *scope.get(&e_sh).unwrap();
        assert!(!crate::ops::display(&vm.store, &vm.strings, e_handle).contains('c'));
    }
}
