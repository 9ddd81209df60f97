//! String object methods (`'x'.to_upper()`, `'-'.join([...])`, …).

use kiln_collections::Tag;

use super::{expect_array, expect_str, BuiltinArgs, BuiltinTable};
use crate::error::VmResult;
use crate::vm::Vm;
use kiln_collections::ObjectHandle;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add_method(Tag::Str, "to_upper", to_upper, 0, 0, &[], &[]);
    table.add_method(Tag::Str, "to_lower", to_lower, 0, 0, &[], &[]);
    table.add_method(Tag::Str, "strip", strip, 0, 0, &[], &[]);
    table.add_method(Tag::Str, "contains", str_contains, 1, 1, &[], &[]);
    table.add_method(Tag::Str, "startswith", startswith, 1, 1, &[], &[]);
    table.add_method(Tag::Str, "endswith", endswith, 1, 1, &[], &[]);
    table.add_method(Tag::Str, "replace", replace, 2, 2, &[], &[]);
    table.add_method(Tag::Str, "split", split, 0, 1, &[], &[]);
    table.add_method(Tag::Str, "join", join, 1, 1, &[], &[]);
    table.add_method(Tag::Str, "format", format, 0, None, &[], &[]);
    table.add_method(Tag::Str, "to_int", to_int, 0, 0, &[], &[]);
    table.add_method(Tag::Str, "version_compare", version_compare, 1, 1, &[], &[]);
}

fn recv_str(vm: &Vm, args: &BuiltinArgs) -> VmResult<String> {
    expect_str(vm, args.receiver.expect("string method called without a receiver"), "receiver")
}

fn to_upper(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?.to_uppercase();
    Ok(vm.alloc_str_value(&s))
}

fn to_lower(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?.to_lowercase();
    Ok(vm.alloc_str_value(&s))
}

fn strip(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?.trim().to_string();
    Ok(vm.alloc_str_value(&s))
}

fn str_contains(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?;
    let needle = expect_str(vm, args.pos(0).unwrap(), "needle")?;
    Ok(vm.store.alloc_bool(s.contains(&needle)))
}

fn startswith(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?;
    let prefix = expect_str(vm, args.pos(0).unwrap(), "prefix")?;
    Ok(vm.store.alloc_bool(s.starts_with(&prefix)))
}

fn endswith(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?;
    let suffix = expect_str(vm, args.pos(0).unwrap(), "suffix")?;
    Ok(vm.store.alloc_bool(s.ends_with(&suffix)))
}

fn replace(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?;
    let from = expect_str(vm, args.pos(0).unwrap(), "from")?;
    let to = expect_str(vm, args.pos(1).unwrap(), "to")?;
    Ok(vm.alloc_str_value(&s.replace(&from, &to)))
}

fn split(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?;
    let sep = match args.pos(0) {
        Some(h) => expect_str(vm, h, "separator")?,
        None => " ".to_string(),
    };
    let parts: Vec<String> = if sep.is_empty() { s.split_whitespace().map(str::to_string).collect() } else { s.split(&sep).map(str::to_string).collect() };
    let mut backbone = kiln_collections::ArrayBackbone::empty();
    for part in parts {
        let h = vm.alloc_str_value(&part);
        backbone.push(&mut vm.store.array_cells, h);
    }
    Ok(vm.store.alloc_array(backbone))
}

fn join(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let sep = recv_str(vm, &args)?;
    let items = expect_array(vm, args.pos(0).unwrap(), "join list")?;
    let rendered: Vec<String> = items.into_iter().map(|h| crate::ops::display(&vm.store, &vm.strings, h)).collect();
    Ok(vm.alloc_str_value(&rendered.join(&sep)))
}

fn format(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let mut s = recv_str(vm, &args)?;
    for (i, &h) in args.positional.iter().enumerate() {
        let placeholder = format!("@{i}@");
        s = s.replace(&placeholder, &crate::ops::display(&vm.store, &vm.strings, h));
    }
    Ok(vm.alloc_str_value(&s))
}

fn to_int(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let s = recv_str(vm, &args)?;
    let n: i64 = s.trim().parse().map_err(|_| crate::error::VmError::TypeError(format!("'{s}' is not a valid integer")))?;
    Ok(vm.store.alloc_num(n))
}

fn version_compare(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let a = recv_str(vm, &args)?;
    let spec = expect_str(vm, args.pos(0).unwrap(), "version comparator")?;
    Ok(vm.store.alloc_bool(crate::ops::version_compare(&a, &spec)))
}
