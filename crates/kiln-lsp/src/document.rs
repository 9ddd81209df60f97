//! Open-document store plus the byte-offset bookkeeping hover/completion
//! need. LSP positions are `(line, character)`; we treat `character` as a
//! UTF-8 byte offset within the line rather than a UTF-16 code-unit count —
//! `meson.build` sources are overwhelmingly ASCII, and the spec scopes LSP
//! support to "basic framing", not full UTF-16 position fidelity.

use std::collections::HashMap;

use kiln_syntax::{LexMode, Lexer, TokenKind};

#[derive(Default)]
pub struct Documents {
    open: HashMap<String, String>,
}

impl Documents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, uri: String, text: String) {
        self.open.insert(uri, text);
    }

    pub fn update(&mut self, uri: &str, text: String) {
        self.open.insert(uri.to_string(), text);
    }

    pub fn close(&mut self, uri: &str) {
        self.open.remove(uri);
    }

    #[must_use]
    pub fn text(&self, uri: &str) -> Option<&str> {
        self.open.get(uri).map(String::as_str)
    }
}

/// Converts a 0-based `(line, character)` position into a byte offset.
#[must_use]
pub fn offset_of(text: &str, line: u32, character: u32) -> usize {
    let mut offset = 0;
    for (i, line_text) in text.split('\n').enumerate() {
        if i as u32 == line {
            return offset + (character as usize).min(line_text.len());
        }
        offset += line_text.len() + 1;
    }
    text.len()
}

/// The identifier token covering `offset`, if the cursor sits inside one.
#[must_use]
pub fn identifier_at(text: &str, offset: usize) -> Option<String> {
    let mut lexer = Lexer::new(text, LexMode::Extended);
    loop {
        let tok = lexer.next_token();
        if tok.kind == TokenKind::Eof {
            return None;
        }
        if tok.kind == TokenKind::Identifier && offset >= tok.offset && offset <= tok.offset + tok.text.len() {
            return Some(tok.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_of_finds_second_line() {
        let text = "x = 1\ny = 2\n";
        assert_eq!(offset_of(text, 1, 0), 6);
        assert_eq!(offset_of(text, 1, 2), 8);
    }

    #[test]
    fn identifier_at_matches_cursor_inside_token() {
        let text = "executable('a')";
        assert_eq!(identifier_at(text, 3), Some("executable".to_string()));
        assert_eq!(identifier_at(text, 11), None);
    }
}
