//! `setup --break LINE`: a `Behavior` that records every instruction
//! visited so the driver can report, after the run, which ones landed on
//! the requested source line. No interactive pause — an interactive
//! debugger front end is a terminal-UI concern, out of scope here; this
//! is the observable half of "breakpoint" the interface promises.

use kiln_vm::Behavior;

#[derive(Debug, Default)]
pub struct BreakpointBehavior {
    visited: Vec<(usize, usize)>,
}

impl BreakpointBehavior {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(chunk_index, ip)` the dispatch loop reached, in execution
    /// order. The driver resolves these to source lines after the run
    /// completes, via `Vm::chunk_location_for`.
    #[must_use]
    pub fn visited(&self) -> &[(usize, usize)] {
        &self.visited
    }
}

impl Behavior for BreakpointBehavior {
    fn on_instruction(&mut self, chunk_index: usize, ip: usize) {
        self.visited.push((chunk_index, ip));
    }

    fn name(&self) -> &'static str {
        "breakpoint"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
