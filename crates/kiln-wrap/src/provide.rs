//! Accumulates `[provide]` sections from every wrap in a project into two
//! name -> subproject lookup tables, the way `dependency('name')` consults
//! them before falling back to "no such dependency".

use indexmap::IndexMap;

use crate::wrapfile::Provides;

/// A provide that replaced an earlier one for the same name — the caller
/// decides whether/how to surface this (a diagnostic warning, matching
/// the original's "previous provide ... is being overridden").
pub struct Overridden {
    pub name: String,
    pub previous_subproject: String,
    pub new_subproject: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProvideMap {
    dependencies: IndexMap<String, String>,
    programs: IndexMap<String, String>,
}

impl ProvideMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one wrap's `[provide]` entries in, keyed by `wrap_name` (the
    /// subproject directory name). Returns any names this wrap's
    /// provides overwrote.
    pub fn register(&mut self, wrap_name: &str, provides: &Provides) -> Vec<Overridden> {
        let mut overridden = Vec::new();
        for dep in provides.dependency_names.iter().chain(provides.renamed.iter().map(|(k, _)| k)) {
            if let Some(previous) = self.dependencies.insert(dep.clone(), wrap_name.to_string()) {
                if previous != wrap_name {
                    overridden.push(Overridden { name: dep.clone(), previous_subproject: previous, new_subproject: wrap_name.to_string() });
                }
            }
        }
        for prog in &provides.program_names {
            if let Some(previous) = self.programs.insert(prog.clone(), wrap_name.to_string()) {
                if previous != wrap_name {
                    overridden.push(Overridden { name: prog.clone(), previous_subproject: previous, new_subproject: wrap_name.to_string() });
                }
            }
        }
        overridden
    }

    #[must_use]
    pub fn subproject_for_dependency(&self, name: &str) -> Option<&str> {
        self.dependencies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn subproject_for_program(&self, name: &str) -> Option<&str> {
        self.programs.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_name_resolves_to_subproject() {
        let mut map = ProvideMap::new();
        let provides = Provides { dependency_names: vec!["zlib".to_string()], ..Provides::default() };
        assert!(map.register("zlib-1.3", &provides).is_empty());
        assert_eq!(map.subproject_for_dependency("zlib"), Some("zlib-1.3"));
    }

    #[test]
    fn later_wrap_overriding_earlier_is_reported() {
        let mut map = ProvideMap::new();
        let a = Provides { dependency_names: vec!["foo".to_string()], ..Provides::default() };
        let b = Provides { dependency_names: vec!["foo".to_string()], ..Provides::default() };
        map.register("foo-a", &a);
        let overridden = map.register("foo-b", &b);
        assert_eq!(overridden.len(), 1);
        assert_eq!(overridden[0].previous_subproject, "foo-a");
    }
}
