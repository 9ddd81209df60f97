//! The in-memory build-domain object graph: everything `executable()`,
//! `dependency()`, `test()`, and friends accumulate as the script runs.
//! `kiln-vm` owns this the same way `ObjectStore` owns arrays and dicts —
//! through `alloc_ext`, keyed by a `(Tag, slot)` pair the core object table
//! never has to interpret.

use kiln_collections::ObjectHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Executable,
    SharedLibrary,
    StaticLibrary,
    Both,
}

#[derive(Debug, Clone)]
pub struct BuildTargetDef {
    pub name: String,
    pub kind: TargetKind,
    pub sources: Vec<String>,
    pub dependencies: Vec<ObjectHandle>,
    pub install: bool,
}

#[derive(Debug, Clone)]
pub struct CustomTargetDef {
    pub name: String,
    pub command: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DependencyDef {
    pub name: String,
    pub found: bool,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct TestDef {
    pub name: String,
    pub target: ObjectHandle,
    pub args: Vec<String>,
}

/// The project-wide accumulator. A fresh `Vm` starts with an empty one;
/// `project()` fills in `name`/`version`/`languages`, every target- or
/// dependency-producing builtin appends to the relevant `Vec`.
#[derive(Debug, Default)]
pub struct ProjectModel {
    pub name: String,
    pub version: String,
    pub languages: Vec<String>,
    pub targets: Vec<BuildTargetDef>,
    pub custom_targets: Vec<CustomTargetDef>,
    pub dependencies: Vec<DependencyDef>,
    pub tests: Vec<TestDef>,
    pub install_targets: Vec<String>,
    pub subproject_stack: Vec<String>,
}
