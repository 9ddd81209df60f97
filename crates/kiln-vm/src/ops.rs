//! Operator dispatch tables: `add`, `sub`, `lt`, `eq`, … on concrete
//! operand pairs, plus the `typeinfo` compatibility matrix consulted when
//! either side is a `typeinfo` object (the analyzer's widened values).
//!
//! Real Meson's tables are organized as a 2D `(tag, tag) -> fn` grid; we
//! use a `match` on `(Tag, Tag)` per operator instead, which the compiler
//! turns into the same jump table and reads better without a separate
//! registration step.

use kiln_collections::{ObjectHandle, ObjectStore, StringInterner, Tag};
use kiln_types::TypeTag;

use crate::error::{VmError, VmResult};

fn str_of(store: &ObjectStore, strings: &StringInterner, h: ObjectHandle) -> Option<String> {
    match store.payload_of(h)? {
        kiln_collections::Payload::Str(sh) => Some(strings.as_str(sh).to_string()),
        _ => None,
    }
}

fn num_of(store: &ObjectStore, h: ObjectHandle) -> Option<i64> {
    match store.payload_of(h)? {
        kiln_collections::Payload::Num(n) => Some(n),
        _ => None,
    }
}

fn bool_of(store: &ObjectStore, h: ObjectHandle) -> Option<bool> {
    match store.payload_of(h)? {
        kiln_collections::Payload::Bool(b) => Some(b),
        _ => None,
    }
}

/// Meson truthiness: `false`/`null`/empty string/empty array/empty
/// dict/`0` are falsy, everything else (including `disabler`) is truthy
/// for the purposes of `and`/`or`/`if` — `disabler` short-circuits
/// earlier, at the jump opcodes, before truthiness is even asked.
#[must_use]
pub fn truthy(store: &ObjectStore, strings: &StringInterner, h: ObjectHandle) -> bool {
    match store.tag_of(h) {
        Some(Tag::Bool) => bool_of(store, h).unwrap_or(false),
        Some(Tag::Null) | Some(Tag::None) => false,
        Some(Tag::Num) => num_of(store, h).unwrap_or(0) != 0,
        Some(Tag::Str) => str_of(store, strings, h).map(|s| !s.is_empty()).unwrap_or(false),
        Some(Tag::Array) => store.array(h).map(|a| !a.is_empty()).unwrap_or(false),
        Some(Tag::Dict) => store.dict(h).map(|d| !d.is_empty()).unwrap_or(false),
        _ => true,
    }
}

fn is_disabler(store: &ObjectStore, h: ObjectHandle) -> bool {
    store.tag_of(h) == Some(Tag::Disabler)
}

/// `add`: number addition, string/array concatenation, dict merge
/// (right-hand keys win). Disablers short-circuit: any operation on one
/// yields a disabler.
pub fn add(store: &mut ObjectStore, strings: &mut StringInterner, a: ObjectHandle, b: ObjectHandle) -> VmResult<ObjectHandle> {
    if is_disabler(store, a) || is_disabler(store, b) {
        return Ok(ObjectHandle::DISABLER);
    }
    match (store.tag_of(a), store.tag_of(b)) {
        (Some(Tag::Num), Some(Tag::Num)) => Ok(store.alloc_num(num_of(store, a).unwrap() + num_of(store, b).unwrap())),
        (Some(Tag::Str), Some(Tag::Str)) => {
            let joined = format!("{}{}", str_of(store, strings, a).unwrap(), str_of(store, strings, b).unwrap());
            let sh = strings.make_str(&joined);
            Ok(store.alloc_str(sh))
        }
        (Some(Tag::Array), Some(Tag::Array)) => {
            let mut result = store.array(a).copied().unwrap();
            let other = store.array(b).copied().unwrap();
            result.extend(&mut store.array_cells, &other);
            Ok(store.alloc_array(result))
        }
        (Some(Tag::Array), _) => {
            let mut result = store.array(a).copied().unwrap();
            result.push(&mut store.array_cells, b);
            Ok(store.alloc_array(result))
        }
        (Some(Tag::Dict), Some(Tag::Dict)) => {
            let mut entries = store.dict(a).unwrap().entries(&store.dict_cells);
            entries.extend(store.dict(b).unwrap().entries(&store.dict_cells));
            let mut result = kiln_collections::DictBackbone::empty();
            for (k, v) in entries {
                result.set(&mut store.dict_cells, k, v);
            }
            Ok(store.alloc_dict(result))
        }
        _ => Err(VmError::BadOperandTypes { op: "+" }),
    }
}

pub fn sub(store: &mut ObjectStore, a: ObjectHandle, b: ObjectHandle) -> VmResult<ObjectHandle> {
    arith(store, a, b, "-", |x, y| x - y)
}

pub fn mul(store: &mut ObjectStore, a: ObjectHandle, b: ObjectHandle) -> VmResult<ObjectHandle> {
    arith(store, a, b, "*", |x, y| x * y)
}

pub fn div(store: &mut ObjectStore, strings: &mut StringInterner, a: ObjectHandle, b: ObjectHandle) -> VmResult<ObjectHandle> {
    if is_disabler(store, a) || is_disabler(store, b) {
        return Ok(ObjectHandle::DISABLER);
    }
    if let (Some(Tag::Str), Some(Tag::Str)) = (store.tag_of(a), store.tag_of(b)) {
        // Meson overloads `/` on strings as a path join.
        let left = str_of(store, strings, a).unwrap();
        let right = str_of(store, strings, b).unwrap();
        let joined = join_path(&left, &right);
        let sh = strings.make_str(&joined);
        return Ok(store.alloc_str(sh));
    }
    match (num_of(store, a), num_of(store, b)) {
        (Some(x), Some(y)) => {
            if y == 0 {
                Err(VmError::DivisionByZero)
            } else {
                Ok(store.alloc_num(x.div_euclid(y)))
            }
        }
        _ => Err(VmError::BadOperandTypes { op: "/" }),
    }
}

pub fn modulo(store: &mut ObjectStore, a: ObjectHandle, b: ObjectHandle) -> VmResult<ObjectHandle> {
    if is_disabler(store, a) || is_disabler(store, b) {
        return Ok(ObjectHandle::DISABLER);
    }
    match (num_of(store, a), num_of(store, b)) {
        (Some(_), Some(0)) => Err(VmError::DivisionByZero),
        (Some(x), Some(y)) => Ok(store.alloc_num(x.rem_euclid(y))),
        _ => Err(VmError::BadOperandTypes { op: "%" }),
    }
}

fn arith(store: &mut ObjectStore, a: ObjectHandle, b: ObjectHandle, op: &'static str, f: impl Fn(i64, i64) -> i64) -> VmResult<ObjectHandle> {
    if is_disabler(store, a) || is_disabler(store, b) {
        return Ok(ObjectHandle::DISABLER);
    }
    match (num_of(store, a), num_of(store, b)) {
        (Some(x), Some(y)) => Ok(store.alloc_num(f(x, y))),
        _ => Err(VmError::BadOperandTypes { op }),
    }
}

fn join_path(a: &str, b: &str) -> String {
    if b.starts_with('/') {
        return b.to_string();
    }
    if a.is_empty() || a.ends_with('/') {
        format!("{a}{b}")
    } else {
        format!("{a}/{b}")
    }
}

/// Deep structural equality, matching Meson's `==`: same tag, same
/// content (recursively for arrays/dicts), numeric/string/bool compared
/// by value.
#[must_use]
pub fn values_equal(store: &ObjectStore, strings: &StringInterner, a: ObjectHandle, b: ObjectHandle) -> bool {
    if a == b {
        return true;
    }
    match (store.tag_of(a), store.tag_of(b)) {
        (Some(Tag::Num), Some(Tag::Num)) => num_of(store, a) == num_of(store, b),
        (Some(Tag::Str), Some(Tag::Str)) => str_of(store, strings, a) == str_of(store, strings, b),
        (Some(Tag::Bool), Some(Tag::Bool)) => bool_of(store, a) == bool_of(store, b),
        (Some(Tag::Array), Some(Tag::Array)) => {
            let (arr_a, arr_b) = (store.array(a).unwrap(), store.array(b).unwrap());
            if arr_a.len() != arr_b.len() {
                return false;
            }
            arr_a.iter(&store.array_cells).zip(arr_b.iter(&store.array_cells)).all(|(x, y)| values_equal(store, strings, x, y))
        }
        (Some(Tag::Dict), Some(Tag::Dict)) => {
            let (da, db) = (store.dict(a).unwrap(), store.dict(b).unwrap());
            if da.len() != db.len() {
                return false;
            }
            da.entries(&store.dict_cells)
                .into_iter()
                .all(|(k, v)| db.get(&store.dict_cells, k).is_some_and(|ov| values_equal(store, strings, v, ov)))
        }
        _ => false,
    }
}

/// Numeric/lexicographic ordering for `<`/`>`/`<=`/`>=`. Strings compare
/// looking like version numbers trigger the "did you mean
/// `version_compare`?" hint at the call site, not here.
pub fn compare(store: &ObjectStore, strings: &StringInterner, a: ObjectHandle, b: ObjectHandle) -> VmResult<std::cmp::Ordering> {
    match (store.tag_of(a), store.tag_of(b)) {
        (Some(Tag::Num), Some(Tag::Num)) => Ok(num_of(store, a).unwrap().cmp(&num_of(store, b).unwrap())),
        (Some(Tag::Str), Some(Tag::Str)) => Ok(str_of(store, strings, a).unwrap().cmp(&str_of(store, strings, b).unwrap())),
        _ => Err(VmError::BadOperandTypes { op: "<" }),
    }
}

/// Dotted-numeric version comparison against a `"op version"` spec, e.g.
/// `version_compare("1.2.0", ">=1.1")`. Splits each dotted component and
/// compares numerically, falling back to 0 for a missing trailing
/// component (`1.2` == `1.2.0`).
#[must_use]
pub fn version_compare(version: &str, spec: &str) -> bool {
    let spec = spec.trim();
    let (op, rest) = if let Some(r) = spec.strip_prefix(">=") {
        (">=", r)
    } else if let Some(r) = spec.strip_prefix("<=") {
        ("<=", r)
    } else if let Some(r) = spec.strip_prefix("==") {
        ("==", r)
    } else if let Some(r) = spec.strip_prefix("!=") {
        ("!=", r)
    } else if let Some(r) = spec.strip_prefix('>') {
        (">", r)
    } else if let Some(r) = spec.strip_prefix('<') {
        ("<", r)
    } else {
        ("==", spec)
    };
    let ordering = version_cmp(version, rest.trim());
    match op {
        ">=" => ordering != std::cmp::Ordering::Less,
        "<=" => ordering != std::cmp::Ordering::Greater,
        "==" => ordering == std::cmp::Ordering::Equal,
        "!=" => ordering != std::cmp::Ordering::Equal,
        ">" => ordering == std::cmp::Ordering::Greater,
        "<" => ordering == std::cmp::Ordering::Less,
        _ => unreachable!(),
    }
}

fn version_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let pa: Vec<u64> = a.split('.').map(|p| p.parse().unwrap_or(0)).collect();
    let pb: Vec<u64> = b.split('.').map(|p| p.parse().unwrap_or(0)).collect();
    for i in 0..pa.len().max(pb.len()) {
        let x = pa.get(i).copied().unwrap_or(0);
        let y = pb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/// Heuristic for the `eq`/`in` "did you mean `version_compare`?" warning:
/// both sides look like dotted version numbers.
#[must_use]
pub fn looks_like_version_compare(store: &ObjectStore, strings: &StringInterner, a: ObjectHandle, b: ObjectHandle) -> bool {
    let looks = |s: &str| s.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    matches!(
        (str_of(store, strings, a), str_of(store, strings, b)),
        (Some(x), Some(y)) if looks(&x) && looks(&y)
    )
}

/// `in`: substring test for strings, membership test for arrays, key
/// presence for dicts.
pub fn contains(store: &ObjectStore, strings: &StringInterner, needle: ObjectHandle, haystack: ObjectHandle) -> VmResult<bool> {
    match store.tag_of(haystack) {
        Some(Tag::Str) => {
            let (n, h) = (str_of(store, strings, needle), str_of(store, strings, haystack));
            match (n, h) {
                (Some(n), Some(h)) => Ok(h.contains(&n)),
                _ => Err(VmError::BadOperandTypes { op: "in" }),
            }
        }
        Some(Tag::Array) => {
            let arr = store.array(haystack).unwrap();
            Ok(arr.iter(&store.array_cells).any(|v| values_equal(store, strings, v, needle)))
        }
        Some(Tag::Dict) => {
            let dict = store.dict(haystack).unwrap();
            let key = match store.payload_of(needle) {
                Some(kiln_collections::Payload::Str(sh)) => kiln_collections::DictKey::Str(sh),
                Some(kiln_collections::Payload::Num(n)) => kiln_collections::DictKey::Int(n),
                _ => return Err(VmError::BadOperandTypes { op: "in" }),
            };
            Ok(dict.get(&store.dict_cells, key).is_some())
        }
        _ => Err(VmError::BadOperandTypes { op: "in" }),
    }
}

/// Unary `not`.
#[must_use]
pub fn not(store: &mut ObjectStore, strings: &StringInterner, a: ObjectHandle) -> ObjectHandle {
    store.alloc_bool(!truthy(store, strings, a))
}

/// Unary `-`.
pub fn negate(store: &mut ObjectStore, a: ObjectHandle) -> VmResult<ObjectHandle> {
    match num_of(store, a) {
        Some(n) => Ok(store.alloc_num(-n)),
        None => Err(VmError::BadOperandTypes { op: "unary -" }),
    }
}

/// `stringify`: renders any value the way it appears inside an f-string
/// interpolation (already-a-string passes through unchanged).
pub fn stringify(store: &mut ObjectStore, strings: &mut StringInterner, a: ObjectHandle) -> ObjectHandle {
    if store.tag_of(a) == Some(Tag::Str) {
        return a;
    }
    let rendered = render(store, strings, a);
    let sh = strings.make_str(&rendered);
    store.alloc_str(sh)
}

/// Public entry point for builtins that need a value's display form
/// without caring whether it's already a string (`message`, `error`, …
/// render their arguments this way, space-joined).
#[must_use]
pub fn display(store: &ObjectStore, strings: &StringInterner, a: ObjectHandle) -> String {
    render(store, strings, a)
}

fn render(store: &ObjectStore, strings: &StringInterner, a: ObjectHandle) -> String {
    match store.tag_of(a) {
        Some(Tag::Str) => str_of(store, strings, a).unwrap_or_default(),
        Some(Tag::Num) => num_of(store, a).unwrap_or(0).to_string(),
        Some(Tag::Bool) => bool_of(store, a).unwrap_or(false).to_string(),
        Some(Tag::Null) | Some(Tag::None) => "None".to_string(),
        Some(Tag::Array) => {
            let items: Vec<String> = store.array(a).unwrap().iter(&store.array_cells).map(|v| format!("'{}'", render(store, strings, v))).collect();
            format!("[{}]", items.join(", "))
        }
        Some(Tag::Dict) => {
            let items: Vec<String> = store
                .dict(a)
                .unwrap()
                .entries(&store.dict_cells)
                .into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        kiln_collections::DictKey::Str(sh) => strings.as_str(sh).to_string(),
                        kiln_collections::DictKey::Int(i) => i.to_string(),
                    };
                    format!("'{key}' : '{}'", render(store, strings, v))
                })
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        _ => String::new(),
    }
}

/// The `typeinfo` compatibility matrix: when either operand of `op` is a
/// `typeinfo` (analyzer mode), decide the result's widened type instead of
/// running the concrete operator. Returns `None` when no row matches
/// (a type error in analyzer mode too).
#[must_use]
pub fn typeinfo_result(op: &str, a: TypeTag, b: TypeTag) -> Option<TypeTag> {
    match op {
        "+" | "-" | "*" | "/" | "%" => Some(TypeTag::from_bits(a.bits() | b.bits())),
        "==" | "!=" | "<" | ">" | "<=" | ">=" | "in" | "not in" => {
            Some(TypeTag::simple(kiln_collections::Tag::Bool))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_matches_meson_rules() {
        let mut store = ObjectStore::new();
        let strings = StringInterner::new();
        assert!(!truthy(&store, &strings, ObjectHandle::FALSE));
        assert!(truthy(&store, &strings, ObjectHandle::TRUE));
        let zero = store.alloc_num(0);
        assert!(!truthy(&store, &strings, zero));
        let empty_arr = store.new_array();
        assert!(!truthy(&store, &strings, empty_arr));
    }

    #[test]
    fn version_looking_strings_are_detected() {
        let mut store = ObjectStore::new();
        let mut strings = StringInterner::new();
        let a = store.alloc_str(strings.make_str("1.2.3"));
        let b = store.alloc_str(strings.make_str("1.3.0"));
        assert!(looks_like_version_compare(&store, &strings, a, b));
    }
}
