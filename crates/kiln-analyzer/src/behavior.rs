//! [`AnalyzerBehavior`]: the patched [`kiln_vm::Behavior`] the analyzer
//! installs in place of [`kiln_vm::RuntimeBehavior`]. Every hook here is
//! purely additive bookkeeping — the VM's own execution semantics are
//! untouched, matching the spec's "the analyzer is the VM run with
//! patched behavior hooks", not a separate evaluator.

use std::collections::HashSet;

use kiln_collections::ObjectHandle;
use kiln_diagnostics::SourceId;
use kiln_vm::Behavior;

/// One `name = value` write, as `kiln_vm` reported it.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub name: String,
    pub value: ObjectHandle,
    pub source: SourceId,
    pub offset: usize,
    /// Set for writes made while iterating an impure (`typeinfo`)
    /// iterable. A real widening pass would immediately lower such a
    /// write to its type tag; this VM's `on_store` hook only observes
    /// the write after it already landed in scope, so the driver treats
    /// `impure` as metadata for its own diagnostics rather than actually
    /// rewriting the stored value (documented in `DESIGN.md`).
    pub impure: bool,
}

/// The assignment index range one `az_branch`/`az_merge` pair enclosed,
/// grouped by variable name so the driver can compare types across
/// branches once the run is over and it has `&ObjectStore` in hand.
#[derive(Debug, Clone)]
pub struct MergeGroup {
    pub by_name: Vec<(String, Vec<usize>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTaken {
    pub chunk_index: usize,
    pub ip: usize,
    pub taken: bool,
    pub impure: bool,
}

#[derive(Debug, Default)]
pub struct AnalyzerBehavior {
    pub assignments: Vec<Assignment>,
    pub merge_groups: Vec<MergeGroup>,
    pub branch_hits: Vec<BranchTaken>,
    pub breakpoints: Vec<usize>,
    visited: HashSet<(usize, usize)>,
    loaded: HashSet<String>,
    branch_starts: Vec<usize>,
    impure_loop_depth: usize,
}

impl AnalyzerBehavior {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn was_read(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    #[must_use]
    pub fn was_visited(&self, chunk_index: usize, ip: usize) -> bool {
        self.visited.contains(&(chunk_index, ip))
    }
}

impl Behavior for AnalyzerBehavior {
    fn on_store(&mut self, name: &str, value: ObjectHandle, source: SourceId, offset: usize) {
        self.assignments.push(Assignment { name: name.to_string(), value, source, offset, impure: self.impure_loop_depth > 0 });
    }

    fn on_load(&mut self, name: &str) {
        self.loaded.insert(name.to_string());
    }

    fn on_az_branch(&mut self) {
        self.branch_starts.push(self.assignments.len());
    }

    fn on_az_merge(&mut self) {
        let Some(start) = self.branch_starts.pop() else { return };
        let mut by_name: Vec<(String, Vec<usize>)> = Vec::new();
        for (idx, assignment) in self.assignments.iter().enumerate().skip(start) {
            match by_name.iter_mut().find(|(n, _)| *n == assignment.name) {
                Some((_, indices)) => indices.push(idx),
                None => by_name.push((assignment.name.clone(), vec![idx])),
            }
        }
        by_name.retain(|(_, indices)| indices.len() > 1);
        if !by_name.is_empty() {
            self.merge_groups.push(MergeGroup { by_name });
        }
    }

    fn on_branch_taken(&mut self, chunk_index: usize, ip: usize, taken: bool) {
        self.branch_hits.push(BranchTaken { chunk_index, ip, taken, impure: self.impure_loop_depth > 0 });
    }

    fn on_loop_enter(&mut self, impure: bool) {
        if impure {
            self.impure_loop_depth += 1;
        }
    }

    fn on_loop_exit(&mut self) {
        if self.impure_loop_depth > 0 {
            self.impure_loop_depth -= 1;
        }
    }

    fn on_breakpoint(&mut self, ip: usize) {
        self.breakpoints.push(ip);
    }

    fn on_instruction(&mut self, chunk_index: usize, ip: usize) {
        self.visited.insert((chunk_index, ip));
    }

    fn name(&self) -> &'static str {
        "analyzer"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
