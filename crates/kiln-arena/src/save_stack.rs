//! Scratch save/restore stack used around re-entrant VM evaluation.
//!
//! The C implementation pushes raw bytes onto a stack with a debug tag
//! alongside each save, so misuse (restoring into the wrong slot) can be
//! caught under a debug build. We keep the same shape with a typed `Vec`
//! instead of a byte buffer, which gets us the same discipline for free
//! from the type system while still carrying the debug tag for tracing.

/// One saved frame of VM state, tagged for debugging/tracing.
#[derive(Debug, Clone)]
struct Slot<T> {
    tag: &'static str,
    value: T,
}

/// A LIFO stack of saved values of type `T`.
#[derive(Debug)]
pub struct SaveStack<T> {
    slots: Vec<Slot<T>>,
}

impl<T> SaveStack<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Pushes `value` tagged with `tag` (a `&'static str` such as
    /// `"scope_stack"` or `"lang_mode"`, matching the macro-supplied debug
    /// tags in the reference implementation).
    pub fn push(&mut self, tag: &'static str, value: T) {
        self.slots.push(Slot { tag, value });
    }

    /// Pops the most recently pushed value, asserting it was tagged with
    /// `expected_tag`. A mismatch indicates the VM unwound through a
    /// different save/restore pairing than it pushed through — a defect.
    pub fn pop(&mut self, expected_tag: &'static str) -> Option<T> {
        let slot = self.slots.pop()?;
        debug_assert_eq!(
            slot.tag, expected_tag,
            "save-stack tag mismatch: pushed {:?}, popped as {:?}",
            slot.tag, expected_tag
        );
        Some(slot.value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> Default for SaveStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_and_pops_in_lifo_order() {
        let mut stack: SaveStack<i32> = SaveStack::new();
        stack.push("a", 1);
        stack.push("b", 2);
        assert_eq!(stack.pop("b"), Some(2));
        assert_eq!(stack.pop("a"), Some(1));
        assert_eq!(stack.pop("a"), None);
    }
}
