//! # Kiln Compiler
//!
//! Turns an [`kiln_syntax::Ast`] into bytecode: one flat `code: Vec<u8>`
//! per function (plus the top-level script), a source-location side table
//! for diagnostics, and literal constants allocated straight into the
//! shared object table the VM will run against.
//!
//! ## Architecture
//!
//! 1. [`opcode`] — the instruction set and its operand-count table.
//! 2. [`chunk`] — the bytecode buffer plus its location side table.
//! 3. [`compiler`] — the AST walk that emits into a [`chunk::Chunk`].

pub mod chunk;
pub mod compiler;
pub mod opcode;

pub use chunk::{Chunk, LocationEntry};
pub use compiler::{CompileError, CompiledUnit, Compiler, FunctionProto, ParamProto};
pub use opcode::{store_flags, Opcode};
