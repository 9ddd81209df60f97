//! Hover text: re-runs the buffer through the analyzer's instrumented VM
//! and reports the type of the nearest preceding assignment to the
//! identifier under the cursor — the same `assignments` bucket
//! `kiln-analyzer`'s unused-variable pass walks, read here instead of
//! recomputed from scratch.

use kiln_analyzer::AnalyzerBehavior;

use crate::document::identifier_at;

#[must_use]
pub fn hover(uri: &str, text: &str, offset: usize) -> Option<String> {
    let name = identifier_at(text, offset)?;
    let run = kiln_analyzer::analyze_source(uri, text).ok()?;
    let behavior = run.vm.behavior().as_any().downcast_ref::<AnalyzerBehavior>()?;

    let assignment = behavior.assignments.iter().filter(|a| a.name == name && a.offset <= offset).next_back()?;
    let tag = run.vm.store.tag_of(assignment.value)?;
    Some(format!("{name}: {tag:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hover_reports_the_assigned_type() {
        let text = "x = 'hello'\n";
        let offset = 0;
        assert_eq!(hover("meson.build", text, offset), Some("x: Str".to_string()));
    }

    #[test]
    fn hover_on_an_unknown_name_is_none() {
        let text = "x = 1\n";
        assert_eq!(hover("meson.build", text, 100), None);
    }
}
