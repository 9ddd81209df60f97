//! Array and dict object methods (`arr.length()`, `d.has_key(k)`, …).

use kiln_collections::{DictKey, Tag};

use super::{expect_str, BuiltinArgs, BuiltinTable};
use crate::error::{VmError, VmResult};
use crate::vm::Vm;
use kiln_collections::ObjectHandle;

pub(super) fn register(table: &mut BuiltinTable) {
    table.add_method(Tag::Array, "length", array_length, 0, 0, &[], &[]);
    table.add_method(Tag::Array, "get", array_get, 1, 2, &[], &[]);
    table.add_method(Tag::Array, "contains", array_contains, 1, 1, &[], &[]);

    table.add_method(Tag::Dict, "keys", dict_keys, 0, 0, &[], &[]);
    table.add_method(Tag::Dict, "get", dict_get, 1, 2, &[], &[]);
    table.add_method(Tag::Dict, "has_key", dict_has_key, 1, 1, &[], &[]);
}

fn array_length(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let arr = vm.store.array(args.receiver.unwrap()).expect("array receiver");
    Ok(vm.store.alloc_num(arr.len() as i64))
}

fn array_get(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let receiver = args.receiver.unwrap();
    let idx_h = args.pos(0).unwrap();
    let idx = match vm.store.payload_of(idx_h) {
        Some(kiln_collections::Payload::Num(n)) => n,
        _ => return Err(VmError::TypeError("array index must be a number".to_string())),
    };
    let arr = vm.store.array(receiver).expect("array receiver");
    let len = arr.len() as i64;
    let resolved = if idx < 0 { idx + len } else { idx };
    if resolved < 0 || resolved >= len {
        return match args.pos(1) {
            Some(default) => Ok(default),
            None => Err(VmError::IndexOutOfRange),
        };
    }
    Ok(arr.get(&vm.store.array_cells, resolved as usize).expect("bounds checked above"))
}

fn array_contains(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let receiver = args.receiver.unwrap();
    let needle = args.pos(0).unwrap();
    let arr = vm.store.array(receiver).expect("array receiver");
    let found = arr.iter(&vm.store.array_cells).any(|v| crate::ops::values_equal(&vm.store, &vm.strings, v, needle));
    Ok(vm.store.alloc_bool(found))
}

fn dict_keys(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let receiver = args.receiver.unwrap();
    let entries = vm.store.dict(receiver).expect("dict receiver").entries(&vm.store.dict_cells);
    let mut backbone = kiln_collections::ArrayBackbone::empty();
    for (key, _) in entries {
        let h = match key {
            DictKey::Str(sh) => vm.store.alloc_str(sh),
            DictKey::Int(n) => vm.store.alloc_num(n),
        };
        backbone.push(&mut vm.store.array_cells, h);
    }
    Ok(vm.store.alloc_array(backbone))
}

fn dict_get(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let receiver = args.receiver.unwrap();
    let key = dict_key(vm, args.pos(0).unwrap())?;
    let dict = vm.store.dict(receiver).expect("dict receiver");
    match dict.get(&vm.store.dict_cells, key) {
        Some(v) => Ok(v),
        None => match args.pos(1) {
            Some(default) => Ok(default),
            None => {
                let name = expect_str(vm, args.pos(0).unwrap(), "key").unwrap_or_default();
                Err(VmError::Custom(format!("key '{name}' not in dictionary")))
            }
        },
    }
}

fn dict_has_key(vm: &mut Vm, args: BuiltinArgs) -> VmResult<ObjectHandle> {
    let receiver = args.receiver.unwrap();
    let key = dict_key(vm, args.pos(0).unwrap())?;
    let dict = vm.store.dict(receiver).expect("dict receiver");
    Ok(vm.store.alloc_bool(dict.get(&vm.store.dict_cells, key).is_some()))
}

fn dict_key(vm: &Vm, h: ObjectHandle) -> VmResult<DictKey> {
    match vm.store.payload_of(h) {
        Some(kiln_collections::Payload::Str(sh)) => Ok(DictKey::Str(sh)),
        Some(kiln_collections::Payload::Num(n)) => Ok(DictKey::Int(n)),
        _ => Err(VmError::TypeError("dict key must be a string or integer".to_string())),
    }
}
