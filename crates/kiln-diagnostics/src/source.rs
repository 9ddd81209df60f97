//! Interned source files and byte-offset → line/column conversion.

/// A handle to one interned source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u32);

impl SourceId {
    /// Constructs a `SourceId` from a raw index, for callers (the
    /// compiler's location table, tests) that need one before or without a
    /// [`SourceTable`] at hand. Does not check the index is in range.
    #[must_use]
    pub fn from_raw(n: u32) -> Self {
        Self(n)
    }

    #[must_use]
    pub fn into_raw(self) -> u32 {
        self.0
    }
}

struct Source {
    path: String,
    text: String,
    /// Byte offset of the start of each line, for a binary-search lookup
    /// in [`SourceTable::line_col`].
    line_starts: Vec<usize>,
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

/// All source files known to one interpreter run.
#[derive(Default)]
pub struct SourceTable {
    sources: Vec<Source>,
}

impl SourceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, text: impl Into<String>) -> SourceId {
        let text = text.into();
        let line_starts = compute_line_starts(&text);
        let id = SourceId(self.sources.len() as u32);
        self.sources.push(Source { path: path.into(), text, line_starts });
        id
    }

    #[must_use]
    pub fn path(&self, id: SourceId) -> &str {
        &self.sources[id.0 as usize].path
    }

    #[must_use]
    pub fn text(&self, id: SourceId) -> &str {
        &self.sources[id.0 as usize].text
    }

    /// Converts a byte offset into 1-based `(line, column)`.
    #[must_use]
    pub fn line_col(&self, id: SourceId, offset: usize) -> (usize, usize) {
        let source = &self.sources[id.0 as usize];
        let line_idx = match source.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = source.line_starts[line_idx];
        let column = source.text[line_start..offset].chars().count() + 1;
        (line_idx + 1, column)
    }

    #[must_use]
    pub fn line_text(&self, id: SourceId, line: usize) -> Option<&str> {
        self.sources[id.0 as usize].text.lines().nth(line.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_finds_first_line() {
        let mut table = SourceTable::new();
        let id = table.add("meson.build", "project('x')\nexecutable('y', 'y.c')\n");
        assert_eq!(table.line_col(id, 0), (1, 1));
    }

    #[test]
    fn line_col_finds_second_line() {
        let mut table = SourceTable::new();
        let id = table.add("meson.build", "project('x')\nexecutable('y', 'y.c')\n");
        let offset = "project('x')\n".len();
        assert_eq!(table.line_col(id, offset), (2, 1));
    }

    #[test]
    fn line_col_finds_mid_line_column() {
        let mut table = SourceTable::new();
        let id = table.add("meson.build", "abc\ndefgh\n");
        let offset = "abc\nde".len();
        assert_eq!(table.line_col(id, offset), (2, 3));
    }

    proptest::proptest! {
        /// The byte offset of the start of line `n` (built by joining
        /// ASCII, newline-free segments with `\n`) always maps back to
        /// `(n, 1)` through `line_col`, for any number/length of lines.
        #[test]
        fn line_col_finds_the_start_of_any_line(
            segments in proptest::collection::vec("[a-z]{0,12}", 1..20),
        ) {
            let mut table = SourceTable::new();
            let text = segments.join("\n");
            let id = table.add("meson.build", text);
            let mut offset = 0usize;
            for (i, segment) in segments.iter().enumerate() {
                proptest::prop_assert_eq!(table.line_col(id, offset), (i + 1, 1));
                offset += segment.len() + 1;
            }
        }
    }
}
