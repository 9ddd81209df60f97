//! The compiled artifact: a flat byte code vector plus its source-location
//! side table.

use kiln_diagnostics::SourceId;

use crate::opcode::Opcode;

/// Maps a `code` offset to the source position that produced it. Built in
/// non-decreasing `code_offset` order, so lookups can binary-search.
#[derive(Debug, Clone, Copy)]
pub struct LocationEntry {
    pub code_offset: u32,
    pub source: SourceId,
    pub source_offset: u32,
}

/// One function's (or the top-level script's) bytecode.
#[derive(Debug, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub locations: Vec<LocationEntry>,
}

impl Chunk {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that everything emitted from here on (until the next mark)
    /// originated at `source_offset` in `source`.
    pub fn mark(&mut self, source: SourceId, source_offset: usize) {
        let code_offset = self.code.len() as u32;
        if let Some(last) = self.locations.last() {
            if last.code_offset == code_offset {
                self.locations.pop();
            }
        }
        self.locations.push(LocationEntry { code_offset, source, source_offset: source_offset as u32 });
    }

    /// The `(source, source_offset)` responsible for the instruction at
    /// `code_offset`, found by binary search over `locations`.
    #[must_use]
    pub fn location_for(&self, code_offset: u32) -> Option<(SourceId, u32)> {
        if self.locations.is_empty() {
            return None;
        }
        let idx = match self.locations.binary_search_by_key(&code_offset, |e| e.code_offset) {
            Ok(i) => i,
            Err(0) => return None,
            Err(i) => i - 1,
        };
        let entry = self.locations[idx];
        Some((entry.source, entry.source_offset))
    }

    pub fn emit_op(&mut self, op: Opcode) -> usize {
        let at = self.code.len();
        self.code.push(op as u8);
        at
    }

    /// Emits `op` followed by `operands`, padding/truncating to exactly
    /// `op.operand_count()` 24-bit little-endian fields. Panics if the
    /// wrong number of operands is given; this is a compiler-internal
    /// invariant, not a user-facing error.
    pub fn emit(&mut self, op: Opcode, operands: &[u32]) -> usize {
        assert_eq!(operands.len(), op.operand_count() as usize, "operand count mismatch for {op:?}");
        let at = self.emit_op(op);
        for &operand in operands {
            self.push_u24(operand);
        }
        at
    }

    fn push_u24(&mut self, value: u32) {
        let bytes = value.to_le_bytes();
        self.code.push(bytes[0]);
        self.code.push(bytes[1]);
        self.code.push(bytes[2]);
    }

    /// Rewrites the 24-bit operand at byte offset `operand_at` in place,
    /// used to backpatch forward jumps once their target is known.
    pub fn patch_u24(&mut self, operand_at: usize, value: u32) {
        let bytes = value.to_le_bytes();
        self.code[operand_at] = bytes[0];
        self.code[operand_at + 1] = bytes[1];
        self.code[operand_at + 2] = bytes[2];
    }

    #[must_use]
    pub fn read_u24(&self, at: usize) -> u32 {
        u32::from(self.code[at]) | (u32::from(self.code[at + 1]) << 8) | (u32::from(self.code[at + 2]) << 16)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_and_read_round_trip_a_24_bit_operand() {
        let mut chunk = Chunk::new();
        let at = chunk.emit(Opcode::Constant, &[0xABCDEF]);
        assert_eq!(chunk.read_u24(at + 1), 0xABCDEF);
    }

    #[test]
    fn patch_rewrites_a_jump_target_in_place() {
        let mut chunk = Chunk::new();
        let jmp_at = chunk.emit(Opcode::Jmp, &[0]);
        chunk.emit_op(Opcode::Pop);
        let target = chunk.len() as u32;
        chunk.patch_u24(jmp_at + 1, target);
        assert_eq!(chunk.read_u24(jmp_at + 1), target);
    }

    #[test]
    fn location_lookup_finds_the_nearest_preceding_mark() {
        let mut chunk = Chunk::new();
        let source = SourceId::from_raw(0);
        chunk.mark(source, 10);
        chunk.emit_op(Opcode::Pop);
        chunk.mark(source, 20);
        chunk.emit_op(Opcode::Dup);
        assert_eq!(chunk.location_for(0), Some((source, 10)));
        assert_eq!(chunk.location_for(1), Some((source, 20)));
    }

    proptest::proptest! {
        /// Any value in the 24-bit operand space round-trips through
        /// `emit`/`read_u24`, and through `patch_u24` rewriting in place.
        #[test]
        fn operand_round_trips_for_any_24_bit_value(value in 0u32..(1 << 24)) {
            let mut chunk = Chunk::new();
            let at = chunk.emit(Opcode::Constant, &[value]);
            proptest::prop_assert_eq!(chunk.read_u24(at + 1), value);
        }

        #[test]
        fn patch_round_trips_for_any_24_bit_value(initial in 0u32..(1 << 24), patched in 0u32..(1 << 24)) {
            let mut chunk = Chunk::new();
            let at = chunk.emit(Opcode::Jmp, &[initial]);
            chunk.patch_u24(at + 1, patched);
            proptest::prop_assert_eq!(chunk.read_u24(at + 1), patched);
        }
    }
}
