//! Script-level builtins with no object receiver: `project`, `message`,
//! `error`, `assert`, option/variable access, and the handful of
//! file/include-directory helpers nearly every `meson.build` calls early.

use kiln_diagnostics::{Diagnostic, Level};

use super::{expect_str, listify, BuiltinArgs, BuiltinTable};
use crate::error::{VmError, VmResult};
use crate::vm::Vm;
use kiln_collections::ObjectHandle;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add_global("project", project, 1, None, &[], &["version", "license", "default_options", "meson_version"]);
    table.add_global("message", message, 0, None, &[], &[]);
    table.add_global("warning", warning, 0, None, &[], &[]);
    table.add_global("error", error, 0, None, &[], &[]);
    table.add_global("summary", summary, 0, None, &[], &[]);
    table.add_global("assert", assert_fn, 1, 2, &[], &[]);
    table.add_global("get_option", get_option, 1, 1, &[], &[]);
    table.add_global("set_variable", set_variable, 2, 2, &[], &[]);
    table.add_global("is_variable", is_variable, 1, 1, &[], &[]);
    table.add_global("files", files, 0, None, &[], &[]);
    table.add_global("include_directories", include_directories, 0, None, &["is_system"], &[]);
    table.add_global("subdir", subdir, 1, 1, &[], &[]);

    table.add_method(kiln_collections::Tag::Module, "project_name", meson_project_name, 0, 0, &[], &[]);
    table.add_method(kiln_collections::Tag::Module, "project_version", meson_project_version, 0, 0, &[], &[]);
    table.add_method(kiln_collections::Tag::Module, "current_source_dir", meson_current_source_dir, 0, 0, &[], &[]);
    table.add_method(kiln_collections::Tag::Module, "current_build_dir", meson_current_build_dir, 0, 0, &[], &[]);
    table.add_method(kiln_collections::Tag::MachineKind, "system", machine_system, 0, 0, &[], &[]);
}

fn meson_project_name(vm: &mut Vm, _args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = vm.model.name.clone();
    Ok(vm.alloc_str_value(&name))
}

fn meson_project_version(vm: &mut Vm, _args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let version = vm.model.version.clone();
    Ok(vm.alloc_str_value(&version))
}

fn meson_current_source_dir(vm: &mut Vm, _args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let dir = vm.current_source_dir.clone();
    Ok(vm.alloc_str_value(&dir))
}

fn meson_current_build_dir(vm: &mut Vm, _args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let dir = vm.current_build_dir.clone();
    Ok(vm.alloc_str_value(&dir))
}

/// Every host here presents as the native build host; cross-compilation's
/// separate host/build/target triples are out of scope.
fn machine_system(vm: &mut Vm, _args: BuiltinArgs) -> VmResult<ObjectHandle> {
    Ok(vm.alloc_str_value(std::env::consts::OS))
}

fn render(vm: &Vm, h: ObjectHandle) -> String {
    crate::ops::display(&vm.store, &vm.strings, h)
}

fn project(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "project name")?;
    vm.model.name = name;
    vm.model.languages = args.positional[1..].iter().filter_map(|&h| expect_str(vm, h, "language").ok()).collect();
    if let Some(v) = args.kwarg("version") {
        vm.model.version = expect_str(vm, v, "version")?;
    }
    Ok(ObjectHandle::NONE)
}

fn message(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let text = args.positional.iter().map(|&h| render(vm, h)).collect::<Vec<_>>().join(" ");
    let (source, offset) = vm.current_location();
    vm.diagnostics.push(Diagnostic::new(Level::Warning, source, offset, format!("message: {text}")));
    Ok(ObjectHandle::NONE)
}

fn warning(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let text = args.positional.iter().map(|&h| render(vm, h)).collect::<Vec<_>>().join(" ");
    let (source, offset) = vm.current_location();
    vm.diagnostics.push(Diagnostic::new(Level::Warning, source, offset, text));
    Ok(ObjectHandle::NONE)
}

fn summary(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let text = args.positional.iter().map(|&h| render(vm, h)).collect::<Vec<_>>().join(" ");
    let (source, offset) = vm.current_location();
    vm.diagnostics.push(Diagnostic::new(Level::Warning, source, offset, format!("summary: {text}")));
    Ok(ObjectHandle::NONE)
}

fn error(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let text = args.positional.iter().map(|&h| render(vm, h)).collect::<Vec<_>>().join(" ");
    Err(VmError::Custom(text))
}

fn assert_fn(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let cond = args.pos(0).unwrap();
    if crate::ops::truthy(&vm.store, &vm.strings, cond) {
        return Ok(ObjectHandle::NONE);
    }
    let message = match args.pos(1) {
        Some(h) => render(vm, h),
        None => "Assertion failed".to_string(),
    };
    Err(VmError::Custom(message))
}

fn get_option(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "option name")?;
    let Some(def) = vm.options.get(&name) else {
        return Err(VmError::Custom(format!("unknown option '{name}'")));
    };
    Ok(vm.alloc_option_value(&def.value.clone()))
}

fn set_variable(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "variable name")?;
    let value = args.pos(1).unwrap();
    vm.store_global(&name, value);
    Ok(ObjectHandle::NONE)
}

fn is_variable(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "variable name")?;
    Ok(vm.store.alloc_bool(vm.lookup_global(&name).is_some()))
}

fn files(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let mut backbone = kiln_collections::ArrayBackbone::empty();
    for h in listify(vm, &args.positional) {
        let path = expect_str(vm, h, "file path")?;
        let sh = vm.strings.make_str(&path);
        let file = vm.store.alloc_file(sh, false);
        backbone.push(&mut vm.store.array_cells, file);
    }
    Ok(vm.store.alloc_array(backbone))
}

fn include_directories(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let paths: Vec<String> = listify(vm, &args.positional).into_iter().filter_map(|h| expect_str(vm, h, "include path").ok()).collect();
    Ok(vm.alloc_include_directory(paths))
}

/// Parses and runs the given subdirectory's `meson.build` in the same
/// scope as the caller, the way real Meson inlines `subdir()` rather than
/// treating it as a real function call.
fn subdir(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let name = expect_str(vm, args.pos(0).unwrap(), "subdir name")?;
    vm.run_subdir(&name)?;
    Ok(ObjectHandle::NONE)
}
