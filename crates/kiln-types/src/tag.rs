//! The 64-bit type tag bit layout.
//!
//! ```text
//! bits  0..=39   simple-tag bitset, one bit per `kiln_collections::Tag` kind
//! bit   40       allow_null
//! bit   41       listify
//! bit   42       glob
//! bits  43..=45  complex kind (0 = none, 1 = or, 2 = nested, 3 = enum, 4 = preset)
//! bits  46..=63  complex payload index, into `ComplexRegistry`
//! ```

use kiln_collections::Tag;

const ALLOW_NULL_BIT: u64 = 1 << 40;
const LISTIFY_BIT: u64 = 1 << 41;
const GLOB_BIT: u64 = 1 << 42;
const COMPLEX_KIND_SHIFT: u32 = 43;
const COMPLEX_KIND_MASK: u64 = 0b111 << COMPLEX_KIND_SHIFT;
const COMPLEX_PAYLOAD_SHIFT: u32 = 46;
const COMPLEX_PAYLOAD_MASK: u64 = 0x3_ffff << COMPLEX_PAYLOAD_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexKind {
    None,
    Or,
    Nested,
    Enum,
    Preset,
}

impl ComplexKind {
    fn from_bits(bits: u64) -> Self {
        match (bits & COMPLEX_KIND_MASK) >> COMPLEX_KIND_SHIFT {
            0 => Self::None,
            1 => Self::Or,
            2 => Self::Nested,
            3 => Self::Enum,
            4 => Self::Preset,
            other => unreachable!("complex kind bit pattern {other} out of range"),
        }
    }

    fn to_bits(self) -> u64 {
        let n: u64 = match self {
            Self::None => 0,
            Self::Or => 1,
            Self::Nested => 2,
            Self::Enum => 3,
            Self::Preset => 4,
        };
        n << COMPLEX_KIND_SHIFT
    }
}

/// One bit per simple `Tag`, matching declaration order in
/// `kiln_collections::object::Tag`.
fn simple_bit(tag: Tag) -> u64 {
    1u64 << (tag as u64).min(39)
}

/// A 64-bit type descriptor: which simple object kinds are acceptable,
/// plus flags controlling how an argument slot coerces its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeTag(u64);

impl TypeTag {
    #[must_use]
    pub fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn simple(tag: Tag) -> Self {
        Self(simple_bit(tag))
    }

    #[must_use]
    pub fn any_of(tags: &[Tag]) -> Self {
        let mut bits = 0;
        for &t in tags {
            bits |= simple_bit(t);
        }
        Self(bits)
    }

    #[must_use]
    pub fn accepts_simple(self, tag: Tag) -> bool {
        self.0 & simple_bit(tag) != 0
    }

    #[must_use]
    pub fn with_allow_null(self) -> Self {
        Self(self.0 | ALLOW_NULL_BIT)
    }

    #[must_use]
    pub fn allow_null(self) -> bool {
        self.0 & ALLOW_NULL_BIT != 0
    }

    #[must_use]
    pub fn with_listify(self) -> Self {
        Self(self.0 | LISTIFY_BIT)
    }

    #[must_use]
    pub fn listify(self) -> bool {
        self.0 & LISTIFY_BIT != 0
    }

    #[must_use]
    pub fn with_glob(self) -> Self {
        Self(self.0 | GLOB_BIT)
    }

    #[must_use]
    pub fn glob(self) -> bool {
        self.0 & GLOB_BIT != 0
    }

    #[must_use]
    pub fn complex_kind(self) -> ComplexKind {
        ComplexKind::from_bits(self.0)
    }

    #[must_use]
    pub fn complex_payload(self) -> Option<u32> {
        if self.complex_kind() == ComplexKind::None {
            return None;
        }
        Some(((self.0 & COMPLEX_PAYLOAD_MASK) >> COMPLEX_PAYLOAD_SHIFT) as u32)
    }

    #[must_use]
    pub fn with_complex(self, kind: ComplexKind, payload: u32) -> Self {
        let payload = u64::from(payload) & 0x3_ffff;
        Self((self.0 & !(COMPLEX_KIND_MASK | COMPLEX_PAYLOAD_MASK)) | kind.to_bits() | (payload << COMPLEX_PAYLOAD_SHIFT))
    }

    #[must_use]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_tag_round_trips() {
        let t = TypeTag::simple(Tag::Str);
        assert!(t.accepts_simple(Tag::Str));
        assert!(!t.accepts_simple(Tag::Num));
    }

    #[test]
    fn flags_are_independent_of_simple_bits() {
        let t = TypeTag::simple(Tag::Array).with_listify().with_allow_null();
        assert!(t.accepts_simple(Tag::Array));
        assert!(t.listify());
        assert!(t.allow_null());
        assert!(!t.glob());
    }

    #[test]
    fn complex_payload_round_trips() {
        let t = TypeTag::empty().with_complex(ComplexKind::Nested, 42);
        assert_eq!(t.complex_kind(), ComplexKind::Nested);
        assert_eq!(t.complex_payload(), Some(42));
    }

    #[test]
    fn no_complex_kind_means_no_payload() {
        let t = TypeTag::simple(Tag::Str);
        assert_eq!(t.complex_kind(), ComplexKind::None);
        assert_eq!(t.complex_payload(), None);
    }

    proptest::proptest! {
        /// The three flag bits and the complex-kind/payload pair never
        /// clobber each other or the simple-tag bitset, regardless of
        /// which order they're set in.
        #[test]
        fn flags_and_complex_payload_are_independent(
            allow_null in proptest::bool::ANY,
            listify in proptest::bool::ANY,
            glob in proptest::bool::ANY,
            set_complex in proptest::bool::ANY,
            payload in 0u32..0x3_ffff,
        ) {
            let mut t = TypeTag::simple(Tag::Array);
            if allow_null {
                t = t.with_allow_null();
            }
            if listify {
                t = t.with_listify();
            }
            if glob {
                t = t.with_glob();
            }
            if set_complex {
                t = t.with_complex(ComplexKind::Enum, payload);
            }

            proptest::prop_assert!(t.accepts_simple(Tag::Array));
            proptest::prop_assert_eq!(t.allow_null(), allow_null);
            proptest::prop_assert_eq!(t.listify(), listify);
            proptest::prop_assert_eq!(t.glob(), glob);
            if set_complex {
                proptest::prop_assert_eq!(t.complex_kind(), ComplexKind::Enum);
                proptest::prop_assert_eq!(t.complex_payload(), Some(payload));
            } else {
                proptest::prop_assert_eq!(t.complex_kind(), ComplexKind::None);
            }
        }
    }
}
