//! Shared parse → compile → run pipeline for a single source unit, the
//! plain-evaluation counterpart to `kiln_analyzer::run::analyze_source`
//! (same shape, `RuntimeBehavior` instead of `AnalyzerBehavior`).

use kiln_collections::ObjectHandle;
use kiln_compiler::Compiler;
use kiln_diagnostics::SourceTable;
use kiln_syntax::{LexMode, Parser};
use kiln_vm::Vm;

use crate::error::CliResult;

/// Parses, compiles, and runs `text` (reported under `path`) against an
/// already-constructed `vm`/`sources` pair, so a caller can seed options
/// or directories first (`kiln-cli setup` does both before the top-level
/// `meson.build` ever runs).
pub fn eval_into(vm: &mut Vm, sources: &mut SourceTable, path: &str, text: &str) -> CliResult<ObjectHandle> {
    let source_id = sources.add(path, text);
    let (root, ast) = Parser::new(text, LexMode::Normal).parse()?;
    let unit = Compiler::compile(&ast, root, &mut vm.store, &mut vm.strings, source_id)?;
    Ok(vm.run_unit(unit)?)
}

/// One completed one-shot evaluation: a fresh `Vm` and `SourceTable`, for
/// callers (`internal eval`) that don't need to seed anything beforehand.
pub struct EvalRun {
    pub vm: Vm,
    pub sources: SourceTable,
    pub result: ObjectHandle,
}

pub fn eval_file(path: &str) -> CliResult<EvalRun> {
    let text = std::fs::read_to_string(path)?;
    let mut vm = Vm::new();
    let mut sources = SourceTable::new();
    let result = eval_into(&mut vm, &mut sources, path, &text)?;
    Ok(EvalRun { vm, sources, result })
}
