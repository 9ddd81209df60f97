//! Full parse → compile → run scenarios, the same pipeline
//! `kiln-cli`'s `eval::eval_into` wires up, exercised here without the CLI
//! layer so the VM's own contracts stand on their own.

use indexmap::IndexMap;
use kiln_collections::{DictKey, ObjectHandle, Payload, StrHandle};
use kiln_compiler::Compiler;
use kiln_diagnostics::SourceTable;
use kiln_syntax::{LexMode, Parser};
use kiln_vm::Vm;

/// Runs `text` as one unit against `scope`, returning the result value and
/// the scope to feed into the next statement — the same threading
/// `internal repl` does through `run_unit_in_scope`.
fn run_in(vm: &mut Vm, scope: IndexMap<StrHandle, ObjectHandle>, text: &str) -> (ObjectHandle, IndexMap<StrHandle, ObjectHandle>) {
    let mut sources = SourceTable::new();
    let source_id = sources.add("meson.build", text);
    let (root, ast) = Parser::new(text, LexMode::Normal).parse().expect("parses");
    let unit = Compiler::compile(&ast, root, &mut vm.store, &mut vm.strings, source_id).expect("compiles");
    vm.run_unit_in_scope(unit, scope).expect("runs")
}

fn run(vm: &mut Vm, text: &str) -> ObjectHandle {
    let scope = vm.seeded_scope();
    let (value, _) = run_in(vm, scope, text);
    value
}

fn lookup(vm: &mut Vm, scope: &IndexMap<StrHandle, ObjectHandle>, name: &str) -> ObjectHandle {
    let key = vm.strings.make_str(name);
    *scope.get(&key).unwrap_or_else(|| panic!("{name} is not bound"))
}

fn num_of(vm: &Vm, handle: ObjectHandle) -> i64 {
    match vm.store.payload_of(handle) {
        Some(Payload::Num(n)) => n,
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn arithmetic_respects_operator_precedence() {
    let mut vm = Vm::new();
    let result = run(&mut vm, "1 + 2 * 3\n");
    assert_eq!(num_of(&vm, result), 7);
}

#[test]
fn array_plus_assign_does_not_retroactively_mutate_an_earlier_alias() {
    let mut vm = Vm::new();
    let scope = vm.seeded_scope();
    let (_, scope) = run_in(&mut vm, scope, "a = [1, 2]\na += 3\nb = a\na += 4\n");

    let a_handle = lookup(&mut vm, &scope, "a");
    let b_handle = lookup(&mut vm, &scope, "b");

    let Some(Payload::Array(a_idx)) = vm.store.payload_of(a_handle) else {
        panic!("a is not an array")
    };
    let Some(Payload::Array(b_idx)) = vm.store.payload_of(b_handle) else {
        panic!("b is not an array")
    };

    let a_values: Vec<i64> = vm.store.arrays.get(a_idx as usize).unwrap().iter(&vm.store.array_cells).map(|h| num_of(&vm, h)).collect();
    let b_values: Vec<i64> = vm.store.arrays.get(b_idx as usize).unwrap().iter(&vm.store.array_cells).map(|h| num_of(&vm, h)).collect();

    assert_eq!(a_values, vec![1, 2, 3, 4]);
    assert_eq!(b_values, vec![1, 2, 3]);
}

#[test]
fn dict_merge_and_iteration_preserve_first_insertion_order() {
    let mut vm = Vm::new();
    let scope = vm.seeded_scope();
    let (result, scope) = run_in(&mut vm, scope, "d = {'a': 1}\nd += {'b': 2}\nd['b']\n");
    assert_eq!(num_of(&vm, result), 2);

    let d_handle = lookup(&mut vm, &scope, "d");
    let Some(Payload::Dict(idx)) = vm.store.payload_of(d_handle) else {
        panic!("d is not a dict")
    };
    let entries = vm.store.dicts.get(idx as usize).unwrap().entries(&vm.store.dict_cells);
    let keys: Vec<String> = entries
        .into_iter()
        .map(|(k, _)| match k {
            DictKey::Str(s) => vm.strings.as_str(s).to_string(),
            DictKey::Int(n) => n.to_string(),
        })
        .collect();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
}
