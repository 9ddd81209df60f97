//! Completion candidates: every variable assigned at or before the cursor
//! (from the analyzer's `assignments` bucket) plus every registered
//! builtin global, bodied or stub.

use kiln_analyzer::AnalyzerBehavior;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionKind {
    Variable,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
}

#[must_use]
pub fn completions(uri: &str, text: &str, offset: usize) -> Vec<CompletionItem> {
    let Ok(run) = kiln_analyzer::analyze_source(uri, text) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut seen = std::collections::HashSet::new();

    if let Some(behavior) = run.vm.behavior().as_any().downcast_ref::<AnalyzerBehavior>() {
        for assignment in &behavior.assignments {
            if assignment.offset <= offset && seen.insert(assignment.name.clone()) {
                items.push(CompletionItem { label: assignment.name.clone(), kind: CompletionKind::Variable });
            }
        }
    }

    for name in run.vm.builtin_names() {
        if seen.insert(name.to_string()) {
            items.push(CompletionItem { label: name.to_string(), kind: CompletionKind::Function });
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_includes_earlier_assignment_and_a_builtin() {
        let text = "x = 1\nmessage('hi')\n";
        let offset = text.len();
        let items = completions("meson.build", text, offset);
        assert!(items.iter().any(|i| i.label == "x" && i.kind == CompletionKind::Variable));
        assert!(items.iter().any(|i| i.label == "project" && i.kind == CompletionKind::Function));
    }
}
