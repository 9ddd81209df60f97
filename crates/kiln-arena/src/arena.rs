//! Growable bump arena.
//!
//! Allocates in blocks (default 4 MiB worth of `T`, not bytes — callers
//! pick `T` to match what they're arena-allocating). `pop_to` releases any
//! blocks allocated after a previously taken [`ArenaMark`].

const DEFAULT_BLOCK_CAPACITY: usize = 4 * 1024 * 1024;

/// Position into an [`Arena`], taken with [`Arena::mark`] and later passed
/// to [`Arena::pop_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMark {
    block_count: usize,
}

/// A bump arena of `T`, growing in fixed-capacity blocks.
///
/// Unlike a raw byte arena, `Arena<T>` hands out values by index rather than
/// pointer — see the crate-level docs for why that's the deliberate choice
/// here.
#[derive(Debug)]
pub struct Arena<T> {
    block_capacity: usize,
    blocks: Vec<Vec<T>>,
}

impl<T> Arena<T> {
    /// Creates an arena whose blocks hold up to `block_capacity` elements.
    #[must_use]
    pub fn new(block_capacity: usize) -> Self {
        Self {
            block_capacity: block_capacity.max(1),
            blocks: Vec::new(),
        }
    }

    /// Takes a mark recording the arena's current extent.
    #[must_use]
    pub fn mark(&self) -> ArenaMark {
        ArenaMark {
            block_count: self.blocks.len(),
        }
    }

    /// Releases any blocks allocated after `mark`. Hard error (panic) if
    /// `mark` does not belong to this arena's history — mirrors the C
    /// implementation's fixed-size-arena overflow contract, just phrased
    /// for misuse of the mark instead of capacity.
    pub fn pop_to(&mut self, mark: ArenaMark) {
        assert!(
            mark.block_count <= self.blocks.len(),
            "arena mark is ahead of the arena's current extent"
        );
        self.blocks.truncate(mark.block_count);
    }

    /// Number of fully allocated blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl<T: Default + Clone> Arena<T> {
    /// Allocates a new zero-valued block and returns its index.
    pub fn alloc_block(&mut self) -> usize {
        self.blocks.push(vec![T::default(); self.block_capacity]);
        self.blocks.len() - 1
    }

    /// The block at `index`, if it's still live.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&[T]> {
        self.blocks.get(index).map(Vec::as_slice)
    }

    /// Mutable access to the block at `index`.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.blocks.get_mut(index).map(Vec::as_mut_slice)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_to_releases_later_blocks() {
        let mut arena: Arena<u64> = Arena::new(4);
        let mark = arena.mark();
        arena.alloc_block();
        arena.alloc_block();
        assert_eq!(arena.block_count(), 2);
        arena.pop_to(mark);
        assert_eq!(arena.block_count(), 0);
    }

    #[test]
    fn blocks_are_zeroed_on_alloc() {
        let mut arena: Arena<u32> = Arena::new(8);
        let idx = arena.alloc_block();
        assert!(arena.block(idx).unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    #[should_panic(expected = "ahead of")]
    fn pop_to_rejects_future_mark() {
        let mut arena: Arena<u8> = Arena::new(4);
        arena.alloc_block();
        let mark = arena.mark();
        arena.pop_to(ArenaMark {
            block_count: mark.block_count + 1,
        });
    }

    proptest::proptest! {
        /// `alloc; mark; alloc...; pop_to(mark)` always leaves the arena at
        /// exactly the block count it had when the mark was taken, regardless
        /// of how many blocks were allocated in between.
        #[test]
        fn pop_to_leaves_no_blocks_above_mark(
            before in 0usize..10,
            after in 0usize..10,
        ) {
            let mut arena: Arena<u32> = Arena::new(4);
            for _ in 0..before {
                arena.alloc_block();
            }
            let mark = arena.mark();
            for _ in 0..after {
                arena.alloc_block();
            }
            arena.pop_to(mark);
            proptest::prop_assert_eq!(arena.block_count(), before);
        }
    }
}
