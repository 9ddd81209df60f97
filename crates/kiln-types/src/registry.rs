//! The side table `complex` type tags index into, plus the named preset
//! recipes (`list-of-string`, `dict-of-string`, `override-find-program`,
//! `toolchain-overrides`, …) memoised per workspace.

use indexmap::IndexMap;

use crate::tag::{ComplexKind, TypeTag};

/// The `(type, subtype)` pair a `complex` tag's payload index resolves to.
/// `or` uses both fields as alternatives; `nested` uses `type` as the
/// container and `subtype` as the element type; `enum` stores its value
/// set directly, not through this pair (see [`ComplexRegistry::enum_values`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexPayload {
    pub type_: TypeTag,
    pub subtype: TypeTag,
}

/// Owns every `complex` tag's out-of-band payload for one interpreter run.
/// Registration is append-only and idempotent by content, mirroring the
/// string interner's dedup-by-content discipline so the same `array[string]`
/// type doesn't register a fresh payload slot every time it's constructed.
#[derive(Default)]
pub struct ComplexRegistry {
    payloads: Vec<ComplexPayload>,
    enum_values: Vec<Vec<String>>,
    presets: IndexMap<String, TypeTag>,
}

impl ComplexRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an `or`/`nested` pair, returning the `TypeTag` with the
    /// right `complex` bits already set.
    pub fn register_pair(&mut self, kind: ComplexKind, type_: TypeTag, subtype: TypeTag) -> TypeTag {
        let payload = ComplexPayload { type_, subtype };
        let index = match self.payloads.iter().position(|p| *p == payload) {
            Some(i) => i,
            None => {
                self.payloads.push(payload);
                self.payloads.len() - 1
            }
        };
        TypeTag::empty().with_complex(kind, index as u32)
    }

    pub fn register_enum(&mut self, values: Vec<String>) -> TypeTag {
        let index = match self.enum_values.iter().position(|v| *v == values) {
            Some(i) => i,
            None => {
                self.enum_values.push(values);
                self.enum_values.len() - 1
            }
        };
        TypeTag::empty().with_complex(ComplexKind::Enum, index as u32)
    }

    #[must_use]
    pub fn pair(&self, index: u32) -> Option<ComplexPayload> {
        self.payloads.get(index as usize).copied()
    }

    #[must_use]
    pub fn enum_set(&self, index: u32) -> Option<&[String]> {
        self.enum_values.get(index as usize).map(Vec::as_slice)
    }

    /// Registers (or returns the already-memoised) preset type named
    /// `name`, built by `build` only on first registration.
    pub fn preset(&mut self, name: &str, build: impl FnOnce(&mut Self) -> TypeTag) -> TypeTag {
        if let Some(&tag) = self.presets.get(name) {
            return tag;
        }
        let tag = build(self);
        self.presets.insert(name.to_string(), tag);
        tag
    }

    /// The standard `list-of-string` preset: `array[string]` with listify.
    pub fn list_of_string(&mut self, simple_string: TypeTag) -> TypeTag {
        self.preset("list-of-string", |reg| {
            reg.register_pair(ComplexKind::Nested, TypeTag::empty(), simple_string).with_listify()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_collections::Tag;

    #[test]
    fn identical_pairs_dedup_to_one_payload_slot() {
        let mut reg = ComplexRegistry::new();
        let str_tag = TypeTag::simple(Tag::Str);
        let a = reg.register_pair(ComplexKind::Nested, TypeTag::empty(), str_tag);
        let b = reg.register_pair(ComplexKind::Nested, TypeTag::empty(), str_tag);
        assert_eq!(a.complex_payload(), b.complex_payload());
        assert_eq!(reg.payloads.len(), 1);
    }

    #[test]
    fn preset_is_memoised() {
        let mut reg = ComplexRegistry::new();
        let str_tag = TypeTag::simple(Tag::Str);
        let a = reg.list_of_string(str_tag);
        let b = reg.list_of_string(str_tag);
        assert_eq!(a, b);
    }

    #[test]
    fn enum_values_are_stored_by_content() {
        let mut reg = ComplexRegistry::new();
        let tag = reg.register_enum(vec!["auto".to_string(), "enabled".to_string(), "disabled".to_string()]);
        let index = tag.complex_payload().expect("enum tag carries a payload index");
        assert_eq!(reg.enum_set(index), Some(&["auto".to_string(), "enabled".to_string(), "disabled".to_string()][..]));
    }
}
