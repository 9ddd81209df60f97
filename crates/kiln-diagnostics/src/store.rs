//! The accumulating, replayable diagnostic store.
//!
//! Every crate downstream of parsing reports through here instead of
//! printing directly, so the CLI controls presentation (`errors-only`,
//! `werror`, `suppress-sources`) in one place regardless of which stage
//! produced the diagnostic.

use crate::diagnostic::{Diagnostic, Level};
use crate::source::{SourceId, SourceTable};

/// How [`DiagnosticStore::replay`] should filter and present the
/// accumulated diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Drop warnings, emit only errors.
    pub errors_only: bool,
    /// Treat warnings as errors for the purpose of the final error flag
    /// (they still render with the `warning` tag).
    pub werror: bool,
    /// Omit the `-->` location line and source snippet, message only.
    pub suppress_sources: bool,
}

/// Accumulates diagnostics during a run; sorted and de-duplicated once at
/// [`DiagnosticStore::replay`] time rather than on every push, so a hot
/// loop reporting the same warning repeatedly doesn't pay sort cost per
/// call.
#[derive(Default)]
pub struct DiagnosticStore {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Whether any diagnostic at `Level::Error` was recorded; the
    /// interpreter's own error flag tracks this independent of `werror`.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    /// Sorts by `(source, offset)`, coalesces exact duplicate
    /// `(source, offset, level, message)` tuples (the repeated-warning
    /// case from a loop body reporting the same condition every
    /// iteration), and returns the survivors honoring `options`.
    #[must_use]
    pub fn replay(&self, options: ReplayOptions) -> Vec<&Diagnostic> {
        let mut indices: Vec<usize> = (0..self.diagnostics.len()).collect();
        indices.sort_by_key(|&i| (self.diagnostics[i].source, self.diagnostics[i].offset));

        let mut seen: Vec<(SourceId, usize, Level, &str)> = Vec::new();
        let mut out = Vec::new();
        for i in indices {
            let d = &self.diagnostics[i];
            if options.errors_only && d.level != Level::Error {
                continue;
            }
            let key = (d.source, d.offset, d.level, d.message.as_str());
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            out.push(d);
        }
        out
    }

    /// Whether [`Self::replay`] under `options` would report at least one
    /// error — `werror` promotes surviving warnings into that count.
    #[must_use]
    pub fn replay_has_errors(&self, options: ReplayOptions) -> bool {
        self.replay(options)
            .iter()
            .any(|d| d.level == Level::Error || (options.werror && d.level == Level::Warning))
    }

    /// Renders every surviving diagnostic as human-readable text.
    #[must_use]
    pub fn render(&self, sources: &SourceTable, options: ReplayOptions) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();
        for d in self.replay(options) {
            if options.suppress_sources {
                let _ = writeln!(out, "{}: {}", d.level.tag(), d.message);
            } else {
                struct Wrap<'a>(&'a Diagnostic, &'a SourceTable);
                impl std::fmt::Display for Wrap<'_> {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        self.0.render(f, self.1)
                    }
                }
                let _ = write!(out, "{}", Wrap(d, sources));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Diagnostic;

    fn src() -> (SourceTable, SourceId) {
        let mut sources = SourceTable::new();
        let id = sources.add("meson.build", "a\nb\nc\n");
        (sources, id)
    }

    #[test]
    fn errors_only_drops_warnings() {
        let (_, id) = src();
        let mut store = DiagnosticStore::new();
        store.push(Diagnostic::new(Level::Warning, id, 0, "unused variable"));
        store.push(Diagnostic::new(Level::Error, id, 2, "undefined variable"));
        let filtered = store.replay(ReplayOptions { errors_only: true, ..Default::default() });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].level, Level::Error);
    }

    #[test]
    fn replay_sorts_by_offset() {
        let (_, id) = src();
        let mut store = DiagnosticStore::new();
        store.push(Diagnostic::new(Level::Error, id, 4, "second"));
        store.push(Diagnostic::new(Level::Error, id, 0, "first"));
        let sorted = store.replay(ReplayOptions::default());
        assert_eq!(sorted[0].message, "first");
        assert_eq!(sorted[1].message, "second");
    }

    #[test]
    fn duplicate_messages_coalesce() {
        let (_, id) = src();
        let mut store = DiagnosticStore::new();
        for _ in 0..3 {
            store.push(Diagnostic::new(Level::Warning, id, 0, "repeated"));
        }
        assert_eq!(store.replay(ReplayOptions::default()).len(), 1);
    }

    #[test]
    fn werror_promotes_warnings() {
        let (_, id) = src();
        let mut store = DiagnosticStore::new();
        store.push(Diagnostic::new(Level::Warning, id, 0, "w"));
        assert!(!store.replay_has_errors(ReplayOptions::default()));
        assert!(store.replay_has_errors(ReplayOptions { werror: true, ..Default::default() }));
    }

    #[test]
    fn render_snapshot_with_sources_suppressed() {
        let mut sources = SourceTable::new();
        let id = sources.add("meson.build", "x = 1\n");
        let mut store = DiagnosticStore::new();
        store.push(Diagnostic::new(Level::Warning, id, 0, "unused variable 'x'"));
        let rendered = store.render(&sources, ReplayOptions { suppress_sources: true, ..Default::default() });
        insta::assert_snapshot!(rendered.trim_end(), @"warning: unused variable 'x'");
    }

    #[test]
    fn full_render_includes_snippet_and_note() {
        let mut sources = SourceTable::new();
        let id = sources.add("meson.build", "x = 1\ny = x + 'a'\nz = y\n");
        let mut store = DiagnosticStore::new();
        let snippet = crate::diagnostic::Snippet::extract(&sources, id, 2, 5);
        store.push(
            Diagnostic::new(Level::Error, id, 10, "expected type number, got string|number")
                .with_snippet(snippet)
                .with_note("x was assigned both a number and a string across branches"),
        );
        let rendered = store.render(&sources, ReplayOptions::default());
        assert!(rendered.contains("expected type number, got string|number"));
        assert!(rendered.contains("meson.build:2:5"));
        assert!(rendered.contains("y = x + 'a'"));
        assert!(rendered.contains("note: x was assigned both a number and a string across branches"));
    }
}
