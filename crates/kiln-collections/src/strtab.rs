//! Content-interned string pool.
//!
//! Strings are deduplicated by content: `make_str` hashes the candidate
//! bytes, probes a dedicated open-addressed index, and either returns the
//! existing handle or appends the bytes to a shared, append-only buffer
//! and publishes a new `{offset, len}` view into it. Because the buffer is
//! append-only, an offset handed out by `make_str` stays valid for the
//! life of the interner (modulo `restore`, which only ever shrinks back to
//! a prior mark).

use crate::hash::fnv1a_64;

/// A handle to an interned string; cheap to copy, compares by content via
/// the handle's index once interned (interning already deduplicates, so
/// `PartialEq` on the handle itself is correct and O(1)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrHandle(u32);

impl StrHandle {
    pub(crate) fn into_raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct StrView {
    offset: u32,
    len: u32,
    /// Strings built from escape processing or concatenation beyond a
    /// small inline threshold are marked `big`; purely cosmetic here (no
    /// separate allocator to free), kept so call sites that branch on it
    /// (e.g. the diagnostic renderer truncating long values) can ask.
    big: bool,
}

const BIG_THRESHOLD: usize = 256;

pub struct StringInterner {
    buffer: Vec<u8>,
    views: Vec<StrView>,
    index: Vec<Option<u32>>, // probe slots -> index into `views`
    mask: usize,
    len: usize,
}

/// A mark taken with [`StringInterner::save`], restored with
/// [`StringInterner::restore`].
#[derive(Debug, Clone, Copy)]
pub struct StrTabMark {
    buffer_len: usize,
    views_len: usize,
}

impl StringInterner {
    #[must_use]
    pub fn new() -> Self {
        let capacity = 64usize;
        Self {
            buffer: Vec::new(),
            views: Vec::new(),
            index: vec![None; capacity],
            mask: capacity - 1,
            len: 0,
        }
    }

    fn content(&self, view: StrView) -> &[u8] {
        let start = view.offset as usize;
        let end = start + view.len as usize;
        &self.buffer[start..end]
    }

    #[must_use]
    pub fn as_str(&self, handle: StrHandle) -> &str {
        let view = self.views[handle.0 as usize];
        // Interning only ever accepts valid UTF-8 input (`&str`), so this
        // is infallible; `from_utf8_unchecked` would need `unsafe`, which
        // this workspace denies, so we pay the (tiny) re-validation cost.
        std::str::from_utf8(self.content(view)).expect("interned bytes are always valid UTF-8")
    }

    #[must_use]
    pub fn len_of(&self, handle: StrHandle) -> usize {
        self.views[handle.0 as usize].len as usize
    }

    #[must_use]
    pub fn is_big(&self, handle: StrHandle) -> bool {
        self.views[handle.0 as usize].big
    }

    fn find(&self, s: &str) -> Result<StrHandle, usize> {
        let hash = fnv1a_64(s.as_bytes());
        let mut idx = (hash as usize) & self.mask;
        for _ in 0..=self.mask {
            match self.index[idx] {
                None => return Err(idx),
                Some(view_idx) => {
                    let view = self.views[view_idx as usize];
                    if self.content(view) == s.as_bytes() {
                        return Ok(StrHandle(view_idx));
                    }
                }
            }
            idx = (idx + 1) & self.mask;
        }
        unreachable!("string index probed its full capacity without finding a free slot")
    }

    /// Interns `s`, returning the existing handle on an exact content
    /// match or publishing a new one.
    pub fn make_str(&mut self, s: &str) -> StrHandle {
        if (self.len + 1) * 2 > self.index.len() {
            self.grow();
        }
        match self.find(s) {
            Ok(handle) => handle,
            Err(slot) => {
                let offset = self.buffer.len() as u32;
                self.buffer.extend_from_slice(s.as_bytes());
                let view = StrView {
                    offset,
                    len: s.len() as u32,
                    big: s.len() >= BIG_THRESHOLD,
                };
                let view_idx = self.views.len() as u32;
                self.views.push(view);
                self.index[slot] = Some(view_idx);
                self.len += 1;
                StrHandle(view_idx)
            }
        }
    }

    fn grow(&mut self) {
        let new_cap = (self.index.len() * 2).max(8);
        let old_index = std::mem::replace(&mut self.index, vec![None; new_cap]);
        self.mask = new_cap - 1;
        for slot in old_index.into_iter().flatten() {
            let view = self.views[slot as usize];
            let hash = fnv1a_64(self.content(view));
            let mut idx = (hash as usize) & self.mask;
            while self.index[idx].is_some() {
                idx = (idx + 1) & self.mask;
            }
            self.index[idx] = Some(slot);
        }
    }

    #[must_use]
    pub fn save(&self) -> StrTabMark {
        StrTabMark {
            buffer_len: self.buffer.len(),
            views_len: self.views.len(),
        }
    }

    /// Restores the interner to a prior mark. Any handle interned after
    /// the mark becomes invalid; callers must not retain such handles
    /// across a restore (this mirrors the VM's own call-stack unwind
    /// discipline, which always restores before any surviving scope could
    /// reference a post-mark string).
    pub fn restore(&mut self, mark: StrTabMark) {
        self.buffer.truncate(mark.buffer_len);
        self.views.truncate(mark.views_len);
        // Rebuild the probe index from scratch; cheaper and simpler than
        // trying to selectively evict entries from open addressing.
        let capacity = self.index.len();
        self.index = vec![None; capacity];
        self.len = 0;
        for i in 0..self.views.len() {
            let view = self.views[i];
            let hash = fnv1a_64(self.content(view));
            let mut idx = (hash as usize) & self.mask;
            while self.index[idx].is_some() {
                idx = (idx + 1) & self.mask;
            }
            self.index[idx] = Some(i as u32);
            self.len += 1;
        }
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_str_is_idempotent() {
        let mut tab = StringInterner::new();
        let a = tab.make_str("hello");
        let b = tab.make_str("hello");
        assert_eq!(a, b);
        assert_eq!(tab.as_str(a), "hello");
    }

    #[test]
    fn distinct_content_gets_distinct_handles() {
        let mut tab = StringInterner::new();
        let a = tab.make_str("foo");
        let b = tab.make_str("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn restore_drops_later_strings() {
        let mut tab = StringInterner::new();
        tab.make_str("kept");
        let mark = tab.save();
        tab.make_str("dropped");
        tab.restore(mark);
        let kept_again = tab.make_str("kept");
        assert_eq!(tab.as_str(kept_again), "kept");
        // Interning "dropped" again must not collide with stale state.
        let again = tab.make_str("dropped");
        assert_eq!(tab.as_str(again), "dropped");
    }

    #[test]
    fn grows_past_load_factor() {
        let mut tab = StringInterner::new();
        let handles: Vec<_> = (0..200).map(|i| tab.make_str(&format!("s{i}"))).collect();
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(tab.as_str(*h), format!("s{i}"));
        }
    }

    #[quickcheck_macros::quickcheck]
    fn make_str_is_idempotent_for_any_string(s: String) -> bool {
        let mut tab = StringInterner::new();
        let a = tab.make_str(&s);
        let b = tab.make_str(&s);
        a == b && tab.as_str(a) == s
    }
}
