//! Wires parsing, compilation, and an [`AnalyzerBehavior`]-patched VM run
//! into one entry point, the way `az_main` in `analyze.c` drives its own
//! interpreter instance over a single `meson.build` buffer.

use kiln_compiler::Compiler;
use kiln_diagnostics::{ReplayOptions, SourceTable};
use kiln_syntax::{LexMode, Parser};
use kiln_vm::Vm;

use crate::behavior::AnalyzerBehavior;
use crate::error::AnalyzerResult;
use crate::report;

/// One completed analysis run. Kept apart from the VM's own diagnostic
/// rendering since the analyzer needs its own [`SourceTable`] (a standalone
/// run, not one subdir among many inside a larger interpreter session).
pub struct AnalysisRun {
    pub vm: Vm,
    pub sources: SourceTable,
}

impl AnalysisRun {
    #[must_use]
    pub fn render(&self, options: ReplayOptions) -> String {
        self.vm.diagnostics.render(&self.sources, options)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.vm.diagnostics.has_errors()
    }
}

/// Parses and compiles `text` (reported under `path`), runs it with
/// [`AnalyzerBehavior`] installed, and folds the behavior's bookkeeping into
/// diagnostics via [`report::synthesize`].
///
/// A runtime error during the run is not propagated: the VM already records
/// it as an error-level diagnostic (see `Vm::record_error`), and the
/// analyzer's job is to surface as many findings as it can from a single
/// pass, not to stop at the first one — the same tolerance `analyze.c`
/// shows a script that errors out partway through.
pub fn analyze_source(path: &str, text: &str) -> AnalyzerResult<AnalysisRun> {
    let mut sources = SourceTable::new();
    let source_id = sources.add(path, text);

    let mut vm = Vm::with_behavior(Box::new(AnalyzerBehavior::new()));
    let (root, ast) = Parser::new(text, LexMode::Normal).parse()?;
    let unit = Compiler::compile(&ast, root, &mut vm.store, &mut vm.strings, source_id)?;

    let _ = vm.run_unit(unit);
    report::synthesize(&mut vm);
    tracing::debug!(path, diagnostics = vm.diagnostics.len(), "analysis finished");

    Ok(AnalysisRun { vm, sources })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_variable_is_reported() {
        let run = analyze_source("meson.build", "x = 1\nmessage('hi')\n").unwrap();
        let text = run.render(ReplayOptions::default());
        assert!(text.contains("unused variable x"), "{text}");
    }

    #[test]
    fn read_variable_is_not_reported() {
        let run = analyze_source("meson.build", "x = 1\nmessage(x)\n").unwrap();
        let text = run.render(ReplayOptions::default());
        assert!(!text.contains("unused variable"), "{text}");
    }

    #[test]
    fn underscore_prefixed_is_never_reported() {
        let run = analyze_source("meson.build", "_unused = 1\n").unwrap();
        let text = run.render(ReplayOptions::default());
        assert!(!text.contains("unused variable"), "{text}");
    }

    #[test]
    fn always_true_condition_is_flagged() {
        let run = analyze_source("meson.build", "if true\n  message('a')\nendif\n").unwrap();
        let text = run.render(ReplayOptions::default());
        assert!(text.contains("branch always taken") || text.contains("branch never taken"), "{text}");
    }

    #[test]
    fn parse_error_is_surfaced_as_err() {
        let err = analyze_source("meson.build", "x = (\n");
        assert!(err.is_err());
    }

    proptest::proptest! {
        /// A script that's nothing but a chain of `name = <number>`
        /// assignments, each name read at least once afterward, always
        /// parses, compiles, and runs clean: every variable is used, so
        /// no `unused variable` diagnostic should ever appear.
        #[test]
        fn read_variables_never_trigger_unused_diagnostics(values in proptest::collection::vec(-1000i64..1000, 1..15)) {
            let mut text = String::new();
            for (i, v) in values.iter().enumerate() {
                text.push_str(&format!("v{i} = {v}\n"));
            }
            for i in 0..values.len() {
                text.push_str(&format!("message(v{i})\n"));
            }
            let run = analyze_source("meson.build", &text).unwrap();
            let rendered = run.render(ReplayOptions::default());
            proptest::prop_assert!(!rendered.contains("unused variable"), "{}", rendered);
        }
    }
}
