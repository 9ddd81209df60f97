//! Target- and dependency-producing builtins: `executable`, `library`,
//! `custom_target`, `dependency`, `test`. Each appends a record to
//! [`crate::model::ProjectModel`] and returns a handle to the object wrapping
//! it, the way real Meson's target objects are later fed to the Ninja
//! backend (out of scope here; the model is the hand-off point).

use super::{expect_str, listify, BuiltinArgs, BuiltinTable};
use crate::error::VmResult;
use crate::model::{BuildTargetDef, DependencyDef, TargetKind, TestDef};
use crate::vm::Vm;
use kiln_collections::{ObjectHandle, Tag};

pub(super) fn register(table: &mut BuiltinTable) {
    table.add_global("executable", |vm, args| target(vm, args, TargetKind::Executable), 1, None, &["install", "dependencies"], &[]);
    table.add_global("static_library", |vm, args| target(vm, args, TargetKind::StaticLibrary), 1, None, &["install", "dependencies"], &[]);
    table.add_global("shared_library", |vm, args| target(vm, args, TargetKind::SharedLibrary), 1, None, &["install", "dependencies"], &[]);
    table.add_global("library", |vm, args| target(vm, args, TargetKind::Both), 1, None, &["install", "dependencies"], &[]);
    table.add_global("custom_target", custom_target, 1, 1, &["command"], &["input", "output"]);
    table.add_global("dependency", dependency, 1, None, &[], &["version", "required"]);
    table.add_global("test", test_fn, 2, 2, &[], &["args"]);

    table.add_method(Tag::Dependency, "found", dependency_found, 0, 0, &[], &[]);
    table.add_method(Tag::Dependency, "version", dependency_version, 0, 0, &[], &[]);
}

fn target(vm: &mut Vm, args: BuiltinArgs, kind: TargetKind) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "target name")?;
    let sources: Vec<String> = listify(vm, &args.positional[1..]).into_iter().filter_map(|h| expect_str(vm, h, "source").ok()).collect();
    let dependencies = args.kwarg("dependencies").map(|h| listify(vm, &[h])).unwrap_or_default();
    let install = args.kwarg("install").map(|h| crate::ops::truthy(&vm.store, &vm.strings, h)).unwrap_or(false);
    let slot = vm.model.targets.len() as u32;
    vm.model.targets.push(BuildTargetDef { name, kind, sources, dependencies, install });
    Ok(vm.store.alloc_ext(Tag::BuildTarget, slot))
}

fn custom_target(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "custom target name")?;
    let command = args
        .kwarg("command")
        .map(|h| listify(vm, &[h]))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| expect_str(vm, h, "command part").ok())
        .collect();
    let inputs = args.kwarg("input").map(|h| listify(vm, &[h])).unwrap_or_default().into_iter().filter_map(|h| expect_str(vm, h, "input").ok()).collect();
    let outputs = args.kwarg("output").map(|h| listify(vm, &[h])).unwrap_or_default().into_iter().filter_map(|h| expect_str(vm, h, "output").ok()).collect();
    let slot = vm.model.custom_targets.len() as u32;
    vm.model.custom_targets.push(crate::model::CustomTargetDef { name, command, inputs, outputs });
    Ok(vm.store.alloc_ext(Tag::CustomTarget, slot))
}

fn dependency(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "dependency name")?;
    let version = match args.kwarg("version") {
        Some(h) => expect_str(vm, h, "version").unwrap_or_default(),
        None => String::new(),
    };
    // Without a real pkg-config/system probe, every dependency resolves as
    // found unless the script explicitly opted out with `required: false`.
    let found = args.kwarg("required").map(|h| crate::ops::truthy(&vm.store, &vm.strings, h)).unwrap_or(true);
    let slot = vm.model.dependencies.len() as u32;
    vm.model.dependencies.push(DependencyDef { name, found, version });
    Ok(vm.store.alloc_ext(Tag::Dependency, slot))
}

fn dependency_found(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let slot = vm.ext_slot(args.receiver.unwrap());
    Ok(vm.store.alloc_bool(vm.model.dependencies[slot as usize].found))
}

fn dependency_version(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let slot = vm.ext_slot(args.receiver.unwrap());
    let version = vm.model.dependencies[slot as usize].version.clone();
    Ok(vm.alloc_str_value(&version))
}

fn test_fn(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "test name")?;
    let target = args.pos(1).unwrap();
    let test_args = args.kwarg("args").map(|h| listify(vm, &[h])).unwrap_or_default().into_iter().filter_map(|h| expect_str(vm, h, "test arg").ok()).collect();
    vm.model.tests.push(TestDef { name, target, args: test_args });
    Ok(ObjectHandle::NONE)
}
