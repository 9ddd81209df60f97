//! The VM's own error type, raised by opcode handlers and builtins and
//! caught by [`crate::vm::Vm::execute`]'s unwind-to-nearest-`eval`-frame
//! logic.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("'{name}' is not defined")]
    UndefinedVariable { name: String },

    #[error("'{name}' has no method or attribute '{member}'")]
    NoSuchMember { name: String, member: String },

    #[error("object is not callable")]
    NotCallable,

    #[error("{tag:?} does not support assignment through '.' or '[]'")]
    NotAssignable { tag: kiln_collections::Tag },

    #[error("unsupported operand types for '{op}'")]
    BadOperandTypes { op: &'static str },

    #[error("index out of range")]
    IndexOutOfRange,

    #[error("division by zero")]
    DivisionByZero,

    #[error("wrong number of positional arguments: expected {expected}, got {got}")]
    ArityMismatch { expected: String, got: usize },

    #[error("unexpected keyword argument '{name}'")]
    UnexpectedKwarg { name: String },

    #[error("missing required keyword argument '{name}'")]
    MissingKwarg { name: String },

    #[error("argument type error: {0}")]
    TypeError(String),

    #[error("'{0}' is not iterable")]
    NotIterable(String),

    #[error("foreach expects {expected} loop variable(s), iterator produces {got}")]
    IteratorArityMismatch { expected: usize, got: usize },

    #[error("'{0}' is not yet implemented")]
    UnimplementedBuiltin(String),

    #[error("{0}")]
    Custom(String),
}

pub type VmResult<T> = Result<T, VmError>;
