//! Behavior hooks the static analyzer patches in for its own VM run.
//!
//! Modeled the way the teacher models pluggable backends (a trait object
//! the core takes by reference, default methods covering the common
//! no-op case) rather than a raw function-pointer vtable: see
//! `depyler_core::backend::TranspilationBackend`. [`RuntimeBehavior`] is
//! the ordinary-evaluation strategy; `kiln-analyzer` supplies the other.
use kiln_collections::ObjectHandle;
use kiln_diagnostics::SourceId;

/// Hooks the VM's dispatch loop calls at fixed points, regardless of which
/// strategy is installed. `Runtime` mode's implementations are all no-ops;
/// the analyzer overrides the ones it needs to build its diagnostics.
pub trait Behavior: std::fmt::Debug {
    /// A `name = value` write just landed in the current frame's scope.
    fn on_store(&mut self, _name: &str, _value: ObjectHandle, _source: SourceId, _offset: usize) {}

    /// A bare identifier resolved to a frame-scope variable (not a
    /// builtin global) — the analyzer's unused-variable pass needs this
    /// half of the read/write picture `on_store` alone doesn't give it.
    fn on_load(&mut self, _name: &str) {}

    /// The dispatch loop is about to execute the instruction at
    /// `(chunk_index, ip)`. Runtime evaluation ignores this; the
    /// analyzer's dead-code pass uses it to build a visited-instruction
    /// set, diffed against every instruction offset after the run.
    fn on_instruction(&mut self, _chunk_index: usize, _ip: usize) {}

    /// An `az_branch` opcode pushed a new scope-group (an `if`/`elif`/
    /// `else` chain is starting).
    fn on_az_branch(&mut self) {}

    /// An `az_merge` opcode closed the most recent scope-group.
    fn on_az_merge(&mut self) {}

    /// A conditional jump's condition was just evaluated; `taken` is
    /// whether the jump fired.
    fn on_branch_taken(&mut self, _chunk_index: usize, _ip: usize, _taken: bool) {}

    /// A `foreach` loop is about to run its body; `impure` is whether the
    /// iterable's element type is a `typeinfo` (the analyzer's walk-twice
    /// case) rather than a concrete value.
    fn on_loop_enter(&mut self, _impure: bool) {}

    fn on_loop_exit(&mut self) {}

    /// The instruction pointer just reached a `dbg_break` marker.
    fn on_breakpoint(&mut self, _ip: usize) {}

    /// Short label for diagnostics/tracing (`"runtime"` or `"analyzer"`).
    fn name(&self) -> &'static str;

    /// Lets a driver recover the concrete behavior after a run (the
    /// analyzer's own findings accumulate on its `AnalyzerBehavior`, not
    /// anywhere the `Vm` itself can see). Every implementor returns `self`.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Plain evaluation: every hook is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeBehavior;

impl Behavior for RuntimeBehavior {
    fn name(&self) -> &'static str {
        "runtime"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
