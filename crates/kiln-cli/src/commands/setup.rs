//! `kiln setup <build-dir>`: evaluate the project root's `meson.build`
//! into a fresh `Vm`, resolve options (environment, `-D`, then whatever
//! `default_options` the script itself declares), and persist the
//! resulting option table and introspection JSON under
//! `<build-dir>/private/`.

use std::path::Path;

use colored::Colorize;
use kiln_diagnostics::{ReplayOptions, SourceTable};
use kiln_vm::{OptionTable, OptionValue, Source, Vm};

use crate::breakpoint::BreakpointBehavior;
use crate::cli::SetupArgs;
use crate::error::{CliError, CliResult};
use crate::eval::eval_into;
use crate::persist::{self, InstallEntry, InstallManifest, PersistedOptions, STANDARD_OPTION_NAMES};

/// Environment variables that bind to the matching builtin option with
/// `Source::Environment`, per the interface description. None of these
/// name a `kiln-vm::OptionTable` entry today (compiler/toolchain
/// detection is out of scope for the interpreter core), so they're
/// recorded verbatim and persisted alongside the option table rather than
/// silently dropped.
const ENV_BINDINGS: &[&str] = &["CC", "CXX", "OBJC", "NASM", "AR", "LD", "NINJA", "CFLAGS", "CXXFLAGS", "CPPFLAGS", "LDFLAGS", "PKG_CONFIG_PATH", "DESTDIR"];

pub fn run(args: SetupArgs) -> CliResult<()> {
    let build_dir = Path::new(&args.build_dir);
    let source_dir = Path::new(&args.source_dir);
    let private = persist::private_dir(build_dir);
    std::fs::create_dir_all(&private)?;

    if private.join("options.json").exists() && !args.reconfigure {
        return Err(CliError::Usage(format!("{} already configured; pass --reconfigure to rerun", args.build_dir)));
    }

    let mut options = OptionTable::with_standard_options();

    let mut env_bindings = Vec::new();
    for name in ENV_BINDINGS {
        if let Ok(value) = std::env::var(name) {
            env_bindings.push((name.to_string(), value.clone()));
            let option_name = name.to_ascii_lowercase();
            if options.get(&option_name).is_some() {
                let _ = options.set(&option_name, OptionValue::String(value), Source::Environment);
            }
        }
    }

    for define in &args.define {
        options.set_from_command_line(define)?;
    }

    let behavior: Box<dyn kiln_vm::Behavior> = match args.break_line {
        Some(_) => Box::new(BreakpointBehavior::new()),
        None => Box::new(kiln_vm::RuntimeBehavior),
    };
    let mut vm = Vm::with_behavior(behavior);
    vm.options = options;
    vm.set_directories(args.source_dir.clone(), args.build_dir.clone());

    let meson_build = source_dir.join("meson.build");
    let text = std::fs::read_to_string(&meson_build).map_err(|e| CliError::Usage(format!("cannot read {}: {e}", meson_build.display())))?;

    let mut sources = SourceTable::new();
    let eval_result = eval_into(&mut vm, &mut sources, &meson_build.to_string_lossy(), &text);

    if let Some(line) = args.break_line {
        report_breakpoint(&vm, &sources, line);
    }

    let rendered = vm.diagnostics.render(&sources, ReplayOptions::default());
    if !rendered.is_empty() {
        print!("{rendered}");
    }

    eval_result?;

    if vm.diagnostics.has_errors() {
        return Err(CliError::DiagnosedErrors);
    }

    let option_names: Vec<&str> = STANDARD_OPTION_NAMES.to_vec();
    let persisted = PersistedOptions::from_table(&vm.options, &option_names);
    persist::write_json(&private.join("options.json"), &persisted)?;
    persist::write_json(&private.join("environment.json"), &env_bindings)?;

    let targets: Vec<serde_json::Value> = vm
        .model
        .targets
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "kind": format!("{:?}", t.kind),
                "sources": t.sources,
                "install": t.install,
            })
        })
        .collect();
    persist::write_json(&private.join("intro-targets.json"), &targets)?;

    let buildoptions: Vec<serde_json::Value> = persisted
        .global_opts
        .iter()
        .chain(persisted.project_opts.iter())
        .map(|o| serde_json::json!({"name": o.name, "value": o.value, "section": if o.builtin { "core" } else { "user" }}))
        .collect();
    persist::write_json(&private.join("intro-buildoptions.json"), &buildoptions)?;

    let manifest = InstallManifest {
        entries: vm
            .model
            .targets
            .iter()
            .filter(|t| t.install)
            .map(|t| InstallEntry {
                src: t.name.clone(),
                dest: persist::prefixed_value(&vm.options, "bindir").unwrap_or_else(|| "bin".to_string()),
            })
            .collect(),
    };
    persist::write_json(&private.join("install-manifest.json"), &manifest)?;

    write_summary(&private, &vm);

    println!("{} {}", "configured".green().bold(), args.build_dir);
    Ok(())
}

fn report_breakpoint(vm: &Vm, sources: &SourceTable, line: u32) {
    for &(chunk_index, ip) in behavior_visited(vm) {
        let Some((source, offset)) = vm.chunk_location_for(chunk_index, ip) else { continue };
        let (hit_line, column) = sources.line_col(source, offset as usize);
        if hit_line as u32 == line {
            println!("{} {}:{}:{}", "breakpoint hit".yellow().bold(), sources.path(source), hit_line, column);
        }
    }
}

fn behavior_visited(vm: &Vm) -> &[(usize, usize)] {
    vm.behavior().as_any().downcast_ref::<BreakpointBehavior>().map(BreakpointBehavior::visited).unwrap_or(&[])
}

fn write_summary(private: &Path, vm: &Vm) {
    let mut text = String::new();
    text.push_str(&format!("project: {}\n", vm.model.name));
    if !vm.model.version.is_empty() {
        text.push_str(&format!("version: {}\n", vm.model.version));
    }
    text.push_str(&format!("targets: {}\n", vm.model.targets.len()));
    text.push_str(&format!("dependencies found: {}\n", vm.model.dependencies.iter().filter(|d| d.found).count()));
    let _ = std::fs::write(private.join("summary.txt"), text);
}
