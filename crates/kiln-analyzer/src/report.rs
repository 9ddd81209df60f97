//! Turns an [`crate::behavior::AnalyzerBehavior`]'s raw bookkeeping into
//! diagnostics, the way `analyze.c`'s post-run passes turn its
//! `assignments`/`branch_map`/`visited_ops` tables into warnings — here
//! done once the VM run has returned, when `&ObjectStore` is available to
//! resolve each recorded [`ObjectHandle`]'s tag.

use kiln_diagnostics::{Diagnostic, DiagnosticStore, Level, SourceId};
use kiln_vm::Vm;

use crate::behavior::{AnalyzerBehavior, BranchTaken};

/// Pushes unused-variable, conflicting-reassignment, and dead-code
/// diagnostics for one completed analyzer run into `vm.diagnostics`.
/// `vm` must have been run with an [`AnalyzerBehavior`] installed.
pub fn synthesize(vm: &mut Vm) {
    let Some(behavior) = vm.behavior().as_any().downcast_ref::<AnalyzerBehavior>() else {
        return;
    };

    let mut findings = Vec::new();
    unused_variables(behavior, &mut findings);
    conflicting_merges(vm, behavior, &mut findings);
    dead_code(vm, behavior, &mut findings);

    for (source, offset, message) in findings {
        vm.diagnostics.push(Diagnostic::new(Level::Warning, source, offset, message));
    }
}

fn unused_variables(behavior: &AnalyzerBehavior, out: &mut Vec<(SourceId, usize, String)>) {
    let mut seen = std::collections::HashSet::new();
    for assignment in &behavior.assignments {
        if assignment.name.starts_with('_') || !seen.insert(assignment.name.clone()) {
            continue;
        }
        if !behavior.was_read(&assignment.name) {
            out.push((assignment.source, assignment.offset, format!("unused variable {}", assignment.name)));
        }
    }
}

fn conflicting_merges(vm: &Vm, behavior: &AnalyzerBehavior, out: &mut Vec<(SourceId, usize, String)>) {
    for group in &behavior.merge_groups {
        for (name, indices) in &group.by_name {
            let tags: Vec<_> = indices.iter().map(|&i| vm.store.tag_of(behavior.assignments[i].value)).collect();
            if tags.windows(2).any(|w| w[0] != w[1]) {
                let last = *indices.last().expect("retained groups have at least 2 entries");
                let assignment = &behavior.assignments[last];
                out.push((
                    assignment.source,
                    assignment.offset,
                    format!("'{name}' is assigned values of conflicting types across branches"),
                ));
            }
        }
    }
}

fn dead_code(vm: &Vm, behavior: &AnalyzerBehavior, out: &mut Vec<(SourceId, usize, String)>) {
    let mut reported = std::collections::HashSet::new();
    for hit in &behavior.branch_hits {
        if hit.impure || !reported.insert((hit.chunk_index, hit.ip)) {
            continue;
        }
        let same_site = |h: &&BranchTaken| h.chunk_index == hit.chunk_index && h.ip == hit.ip;
        let ever_taken = behavior.branch_hits.iter().any(|h| same_site(&h) && h.taken);
        let ever_not_taken = behavior.branch_hits.iter().any(|h| same_site(&h) && !h.taken);
        let message = if ever_taken && !ever_not_taken {
            Some("branch always taken")
        } else if !ever_taken && ever_not_taken {
            Some("branch never taken")
        } else {
            None
        };
        if let (Some(message), Some((source, offset))) = (message, vm.chunk_location_for(hit.chunk_index, hit.ip)) {
            out.push((source, offset as usize, message.to_string()));
        }
    }

    for chunk_index in 0..vm.chunk_count() {
        let mut span_start: Option<(SourceId, usize)> = None;
        for ip in vm.chunk_instruction_offsets(chunk_index) {
            let visited = behavior.was_visited(chunk_index, ip);
            let Some((source, offset)) = vm.chunk_location_for(chunk_index, ip) else { continue };
            match (visited, span_start) {
                (false, None) => span_start = Some((source, offset as usize)),
                (true, Some((start_source, start_offset))) => {
                    out.push((start_source, start_offset, "dead code".to_string()));
                    span_start = None;
                }
                _ => {}
            }
        }
        if let Some((start_source, start_offset)) = span_start {
            out.push((start_source, start_offset, "dead code".to_string()));
        }
    }
}

#[must_use]
pub fn finished(store: &DiagnosticStore) -> bool {
    !store.has_errors()
}
