//! A single diagnostic record and its rustc-style rendering.

use std::fmt;

use colored::Colorize;

use crate::source::{SourceId, SourceTable};

/// Severity, matching the interpreter's own `log_error`/`log_warning`
/// distinction: only `Error` sets the workspace error flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Warning,
    Error,
}

impl Level {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A 3-line source context window with gutter line numbers and a caret
/// underline, in the same shape the interpreter renders for any located
/// error: the line before, the error line, the line after.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub before: Option<(usize, String)>,
    pub error_line: (usize, String),
    pub after: Option<(usize, String)>,
    pub caret_col: usize,
    pub caret_width: usize,
}

impl Snippet {
    #[must_use]
    pub fn extract(sources: &SourceTable, source: SourceId, line: usize, column: usize) -> Self {
        let before = line.checked_sub(1).filter(|&l| l > 0).and_then(|l| {
            sources.line_text(source, l).map(|t| (l, t.to_string()))
        });
        let error_line = (line, sources.line_text(source, line).unwrap_or_default().to_string());
        let after = sources.line_text(source, line + 1).map(|t| (line + 1, t.to_string()));
        let caret_width = estimate_caret_width(&error_line.1, column);
        Self { before, error_line, after, caret_col: column, caret_width }
    }
}

/// Walks forward from `column` while inside an identifier-ish token, so the
/// caret underlines a whole name rather than just its first character.
fn estimate_caret_width(line: &str, column: usize) -> usize {
    let col = column.saturating_sub(1);
    let chars: Vec<char> = line.chars().collect();
    let Some(&start) = chars.get(col) else { return 1 };
    if !(start.is_alphanumeric() || start == '_') {
        return 1;
    }
    let mut end = col;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    (end - col).max(1)
}

/// A located diagnostic: where it happened, what went wrong, and any notes
/// for the human reading the output.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub source: SourceId,
    pub offset: usize,
    pub message: String,
    pub note: Option<String>,
    pub help: Option<String>,
    pub snippet: Option<Snippet>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(level: Level, source: SourceId, offset: usize, message: impl Into<String>) -> Self {
        Self { level, source, offset, message: message.into(), note: None, help: None, snippet: None }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: Snippet) -> Self {
        self.snippet = Some(snippet);
        self
    }

    /// Renders against `sources` for the `-->` location line, which needs
    /// the path and line/column this record doesn't carry on its own.
    pub fn render(&self, f: &mut fmt::Formatter<'_>, sources: &SourceTable) -> fmt::Result {
        let (line, column) = sources.line_col(self.source, self.offset);
        let header_color = match self.level {
            Level::Error => "error".red().bold(),
            Level::Warning => "warning".yellow().bold(),
        };
        writeln!(f, "{header_color}: {}", self.message.bold())?;
        writeln!(f, " {} {}:{}:{}", "-->".blue().bold(), sources.path(self.source), line, column)?;

        if let Some(snippet) = &self.snippet {
            format_snippet(f, snippet)?;
        }
        if let Some(note) = &self.note {
            writeln!(f, "  {}: {note}", "note".yellow().bold())?;
        }
        if let Some(help) = &self.help {
            writeln!(f, "  {}: {help}", "help".green().bold())?;
        }
        Ok(())
    }
}

fn format_snippet(f: &mut fmt::Formatter<'_>, snippet: &Snippet) -> fmt::Result {
    const GUTTER: usize = 4;

    if let Some((num, text)) = &snippet.before {
        writeln!(f, " {:>GUTTER$} {} {}", num.to_string().blue().bold(), "|".blue().bold(), text)?;
    }

    let (num, text) = &snippet.error_line;
    writeln!(f, " {:>GUTTER$} {} {}", num.to_string().blue().bold(), "|".blue().bold(), text)?;

    let padding = snippet.caret_col.saturating_sub(1);
    let carets = "^".repeat(snippet.caret_width.max(1));
    writeln!(f, " {:>GUTTER$} {} {}{}", "", "|".blue().bold(), " ".repeat(padding), carets.red().bold())?;

    if let Some((num, text)) = &snippet.after {
        writeln!(f, " {:>GUTTER$} {} {}", num.to_string().blue().bold(), "|".blue().bold(), text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_width_spans_identifier() {
        assert_eq!(estimate_caret_width("foo_bar = 1", 1), 7);
    }

    #[test]
    fn caret_width_defaults_to_one_on_punctuation() {
        assert_eq!(estimate_caret_width("= 1", 1), 1);
    }

    #[test]
    fn snippet_extract_includes_neighboring_lines() {
        let mut sources = SourceTable::new();
        let id = sources.add("meson.build", "a\nbad_call()\nc\n");
        let snippet = Snippet::extract(&sources, id, 2, 1);
        assert_eq!(snippet.before, Some((1, "a".to_string())));
        assert_eq!(snippet.error_line, (2, "bad_call()".to_string()));
        assert_eq!(snippet.after, Some((3, "c".to_string())));
    }
}
