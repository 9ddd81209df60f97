//! One script exercising three analyzer findings together: a branch that
//! always goes one way, a variable reassigned to a conflicting type
//! inside that branch, and an arithmetic type error the VM itself raises
//! and records as a diagnostic rather than aborting the run.

use kiln_analyzer::analyze_source;
use kiln_diagnostics::ReplayOptions;

#[test]
fn reports_dead_branch_type_conflict_and_type_error_from_one_run() {
    let text = "if true\n  x = 1\n  x = 'two'\nendif\nmessage(x)\nz = x + 1\n";
    let run = analyze_source("meson.build", text).unwrap();
    let rendered = run.render(ReplayOptions::default());

    assert!(rendered.contains("branch always taken") || rendered.contains("branch never taken"), "{rendered}");
    assert!(rendered.contains("'x' is assigned values of conflicting types across branches"), "{rendered}");
    assert!(rendered.contains("unsupported operand types for '+'"), "{rendered}");
    assert!(run.has_errors());
}
