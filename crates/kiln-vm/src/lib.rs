//! # Kiln VM
//!
//! The register-less stack machine that runs [`kiln_compiler`] bytecode.
//! Owns the shared object store, the option/override table, the
//! accumulating build-domain model (`project()`, `executable()`, …), and
//! the builtin function table every script call dispatches through.
//!
//! ## Architecture
//!
//! 1. [`vm`] — the `Vm` struct: frame stack, object stack, dispatch loop.
//! 2. [`ops`] — concrete-operand operator tables (`add`, `lt`, `stringify`, …).
//! 3. [`builtins`] — the registered global/method function table.
//! 4. [`frame`] — the call-frame stack entry shape.
//! 5. [`behavior`] — hooks the static analyzer patches over plain execution.
//! 6. [`model`] — the accumulated build-domain object graph.
//! 7. [`options`] — the option/override resolution system.
//! 8. [`error`] — the VM's own error type.

pub mod behavior;
pub mod builtins;
pub mod error;
pub mod frame;
pub mod model;
pub mod ops;
pub mod options;
pub mod vm;

pub use behavior::{Behavior, RuntimeBehavior};
pub use error::{VmError, VmResult};
pub use frame::{CallFrame, FrameKind};
pub use model::ProjectModel;
pub use options::{Feature, OptionDef, OptionError, OptionTable, OptionType, OptionValue, Source};
pub use vm::Vm;
