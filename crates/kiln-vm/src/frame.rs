//! The call-frame stack.
//!
//! Each frame names a chunk (the top-level script's or one registered
//! function's), an instruction pointer into it, and the local scope that
//! instruction pointer's `load`/`store` ops resolve names against. There is
//! no separate `return_ip` field: a frame's own `ip` already points at the
//! instruction *after* the `call` that pushed the frame above it, because
//! the dispatch loop advances `ip` before acting on an opcode — so
//! resuming a frame after a pop is just continuing to read its `ip`.

use indexmap::IndexMap;
use kiln_collections::{ObjectHandle, StrHandle};
use kiln_types::TypeTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The top-level script (a file's `meson.build`, or one pulled in via
    /// `subdir`/`subproject`).
    Script,
    /// A user-defined function body.
    Function,
}

#[derive(Debug)]
pub struct CallFrame {
    pub chunk_index: usize,
    pub ip: usize,
    pub kind: FrameKind,
    /// Name used in "in function X" unwind messages; empty for `Script`.
    pub func_name: String,
    pub scope: IndexMap<StrHandle, ObjectHandle>,
    pub expected_return: Option<TypeTag>,
    /// Object-stack depth when this frame was pushed, so `return` can
    /// assert the frame leaves exactly one value behind.
    pub stack_base: usize,
}

impl CallFrame {
    #[must_use]
    pub fn script(chunk_index: usize, scope: IndexMap<StrHandle, ObjectHandle>, stack_base: usize) -> Self {
        Self {
            chunk_index,
            ip: 0,
            kind: FrameKind::Script,
            func_name: String::new(),
            scope,
            expected_return: None,
            stack_base,
        }
    }

    #[must_use]
    pub fn function(
        chunk_index: usize,
        func_name: String,
        scope: IndexMap<StrHandle, ObjectHandle>,
        expected_return: Option<TypeTag>,
        stack_base: usize,
    ) -> Self {
        Self { chunk_index, ip: 0, kind: FrameKind::Function, func_name, scope, expected_return, stack_base }
    }
}
