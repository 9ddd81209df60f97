//! `.wrap` INI parsing: `[wrap-file]`, `[wrap-git]`, and `[provide]`
//! sections into a [`WrapFile`] plus its [`Provides`] accumulation.
//!
//! Comments start with `;` or `#`; sections and keys are matched against a
//! fixed vocabulary (unknown keys/sections are hard errors, matching the
//! format's "fixed enum of fields").

use crate::error::{WrapError, WrapResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapKind {
    File,
    Git,
}

/// Dependency and program names this wrap satisfies, gathered from
/// `[provide]`. `dependency_names`/`program_names` are comma-separated
/// lists of names this wrap's subproject provides under its own name;
/// any other `key = value` pair is an explicit rename, recorded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provides {
    pub dependency_names: Vec<String>,
    pub program_names: Vec<String>,
    pub renamed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct WrapFile {
    pub directory: Option<String>,
    pub patch_url: Option<String>,
    pub patch_fallback_url: Option<String>,
    pub patch_filename: Option<String>,
    pub patch_hash: Option<String>,
    pub patch_directory: Option<String>,
    pub diff_files: Option<String>,
    pub source_url: Option<String>,
    pub source_fallback_url: Option<String>,
    pub source_filename: Option<String>,
    pub source_hash: Option<String>,
    pub lead_directory_missing: Option<String>,
    pub url: Option<String>,
    pub revision: Option<String>,
    pub depth: Option<String>,
    pub push_url: Option<String>,
    pub clone_recursive: Option<String>,
    pub wrapdb_version: Option<String>,
    pub kind: Option<WrapKind>,
    pub provides: Provides,
}

impl WrapFile {
    /// `diff_files` split on commas, empty entries dropped.
    #[must_use]
    pub fn diff_file_list(&self) -> Vec<String> {
        self.diff_files
            .as_deref()
            .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn lead_directory_missing(&self) -> bool {
        matches!(self.lead_directory_missing.as_deref(), Some("true"))
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Section {
    None,
    WrapFile,
    WrapGit,
    Provide,
}

/// Parses the text of one `.wrap` file. `path` is used only for error
/// messages.
pub fn parse(path: &str, text: &str) -> WrapResult<WrapFile> {
    let mut wrap = WrapFile::default();
    let mut section = Section::None;
    let mut have_type = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(inner) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            section = match inner {
                "wrap-file" => {
                    check_type_conflict(path, have_type, wrap.kind, WrapKind::File)?;
                    wrap.kind = Some(WrapKind::File);
                    have_type = true;
                    Section::WrapFile
                }
                "wrap-git" => {
                    check_type_conflict(path, have_type, wrap.kind, WrapKind::Git)?;
                    wrap.kind = Some(WrapKind::Git);
                    have_type = true;
                    Section::WrapGit
                }
                "provide" => Section::Provide,
                other => {
                    return Err(WrapError::InvalidSection { path: path.to_string(), line: line_no, section: other.to_string() })
                }
            };
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(WrapError::InvalidKey { path: path.to_string(), key: line.to_string() });
        };
        let key = key.trim();
        let value = value.trim().to_string();

        match section {
            Section::None => return Err(WrapError::KeyOutsideSection { path: path.to_string(), key: key.to_string() }),
            Section::Provide => apply_provide(&mut wrap.provides, key, &value),
            Section::WrapFile | Section::WrapGit => apply_field(&mut wrap, path, line_no, key, value)?,
        }
    }

    if wrap.kind.is_none() {
        return Err(WrapError::MissingType { path: path.to_string() });
    }
    if wrap.source_url.is_some() && wrap.source_filename.is_none() {
        return Err(WrapError::MissingSourceFilename { path: path.to_string() });
    }
    if wrap.kind == Some(WrapKind::Git) && (wrap.url.is_none() || wrap.revision.is_none()) {
        return Err(WrapError::IncompleteGit { path: path.to_string() });
    }
    if wrap.patch_directory.is_some() && wrap.patch_filename.is_some() {
        return Err(WrapError::ConflictingPatch { path: path.to_string() });
    }

    Ok(wrap)
}

fn check_type_conflict(path: &str, have_type: bool, existing: Option<WrapKind>, incoming: WrapKind) -> WrapResult<()> {
    if have_type && existing != Some(incoming) {
        return Err(WrapError::ConflictingTypes { path: path.to_string() });
    }
    Ok(())
}

fn apply_provide(provides: &mut Provides, key: &str, value: &str) {
    let split_csv = |s: &str| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect::<Vec<_>>();
    match key {
        "dependency_names" => provides.dependency_names.extend(split_csv(value)),
        "program_names" => provides.program_names.extend(split_csv(value)),
        other => provides.renamed.push((other.to_string(), value.to_string())),
    }
}

fn apply_field(wrap: &mut WrapFile, path: &str, line: usize, key: &str, value: String) -> WrapResult<()> {
    let slot = match key {
        "directory" => &mut wrap.directory,
        "patch_url" => &mut wrap.patch_url,
        "patch_fallback_url" => &mut wrap.patch_fallback_url,
        "patch_filename" => &mut wrap.patch_filename,
        "patch_hash" => &mut wrap.patch_hash,
        "patch_directory" => &mut wrap.patch_directory,
        "diff_files" => &mut wrap.diff_files,
        "source_url" => &mut wrap.source_url,
        "source_fallback_url" => &mut wrap.source_fallback_url,
        "source_filename" => &mut wrap.source_filename,
        "source_hash" => &mut wrap.source_hash,
        "lead_directory_missing" => &mut wrap.lead_directory_missing,
        "url" => &mut wrap.url,
        "revision" => &mut wrap.revision,
        "depth" => &mut wrap.depth,
        "push_url" => &mut wrap.push_url,
        "clone_recursive" => &mut wrap.clone_recursive,
        "wrapdb_version" => &mut wrap.wrapdb_version,
        other => return Err(WrapError::InvalidKey { path: path.to_string(), key: other.to_string() }),
    };
    if slot.is_some() {
        return Err(WrapError::DuplicateKey { path: path.to_string(), line, key: key.to_string() });
    }
    *slot = Some(value);
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    for (i, c) in line.char_indices() {
        if c == ';' || c == '#' {
            return &line[..i];
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrap_file_section() {
        let text = "[wrap-file]\nsource_url=https://x/y.tar.gz\nsource_filename=y.tar.gz\nsource_hash=abc\n";
        let wrap = parse("test.wrap", text).unwrap();
        assert_eq!(wrap.kind, Some(WrapKind::File));
        assert_eq!(wrap.source_filename.as_deref(), Some("y.tar.gz"));
    }

    #[test]
    fn rejects_conflicting_types() {
        let text = "[wrap-file]\nsource_filename=a\n[wrap-git]\nurl=x\nrevision=y\n";
        assert!(matches!(parse("t.wrap", text), Err(WrapError::ConflictingTypes { .. })));
    }

    #[test]
    fn source_url_without_filename_is_an_error() {
        let text = "[wrap-file]\nsource_url=https://x/y.tar.gz\n";
        assert!(matches!(parse("t.wrap", text), Err(WrapError::MissingSourceFilename { .. })));
    }

    #[test]
    fn git_requires_url_and_revision() {
        let text = "[wrap-git]\nurl=https://example.com/repo.git\n";
        assert!(matches!(parse("t.wrap", text), Err(WrapError::IncompleteGit { .. })));
    }

    #[test]
    fn provide_section_splits_csv_lists() {
        let text = "[wrap-file]\nsource_filename=a\n[provide]\ndependency_names=zlib, zlib-ng\nprogram_names=zlibcli\n";
        let wrap = parse("t.wrap", text).unwrap();
        assert_eq!(wrap.provides.dependency_names, vec!["zlib", "zlib-ng"]);
        assert_eq!(wrap.provides.program_names, vec!["zlibcli"]);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "; a comment\n[wrap-file]\n# another\nsource_filename=a\n\n";
        let wrap = parse("t.wrap", text).unwrap();
        assert_eq!(wrap.source_filename.as_deref(), Some("a"));
    }

    #[test]
    fn duplicate_key_is_an_error() {
        let text = "[wrap-file]\nsource_filename=a\nsource_filename=b\n";
        assert!(matches!(parse("t.wrap", text), Err(WrapError::DuplicateKey { .. })));
    }

    #[test]
    fn git_push_url_and_clone_recursive_use_underscored_keys() {
        let text = "[wrap-git]\nurl=https://example.com/repo.git\nrevision=main\npush_url=git@example.com:repo.git\nclone_recursive=true\n";
        let wrap = parse("t.wrap", text).unwrap();
        assert_eq!(wrap.push_url.as_deref(), Some("git@example.com:repo.git"));
        assert_eq!(wrap.clone_recursive.as_deref(), Some("true"));
    }
}
