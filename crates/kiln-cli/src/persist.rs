//! `<build>/private/` file shapes: serialized via `serde_json` rather
//! than a bespoke binary format, per the teacher's own universal choice
//! for structured on-disk data (the on-disk cache format itself is out
//! of scope; we only need *a* format for these interface-level files).

use std::path::Path;

use serde::{Deserialize, Serialize};

use kiln_vm::{OptionTable, OptionValue};

use crate::error::CliResult;

/// One option's persisted snapshot — `kiln_vm::OptionDef` itself isn't
/// `Serialize` (it carries borrowed-free but otherwise plain-old-data
/// fields that have never needed a wire form before); this is the
/// flattened projection introspection and `options --machine-readable`
/// both want.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedOption {
    pub name: String,
    pub kind: String,
    pub value: String,
    pub source: String,
    pub builtin: bool,
}

/// Dual array `[global_opts, project_opts]`, matching the reference
/// implementation's on-disk option-info shape: built-ins first, then
/// whatever `meson_options.txt` declared.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedOptions {
    pub global_opts: Vec<PersistedOption>,
    pub project_opts: Vec<PersistedOption>,
}

impl PersistedOptions {
    #[must_use]
    pub fn from_table(table: &OptionTable, names: &[&str]) -> Self {
        let mut out = Self::default();
        for name in names {
            let Some(def) = table.get(name) else { continue };
            let entry = PersistedOption {
                name: def.name.clone(),
                kind: format!("{:?}", def.kind),
                value: def.value.to_string(),
                source: format!("{:?}", def.source),
                builtin: def.builtin,
            };
            if def.builtin {
                out.global_opts.push(entry);
            } else {
                out.project_opts.push(entry);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallEntry {
    pub src: String,
    pub dest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InstallManifest {
    pub entries: Vec<InstallEntry>,
}

/// Standard option names introspection walks; `meson_options.txt`-declared
/// names aren't known statically, so callers append those explicitly
/// before persisting.
pub const STANDARD_OPTION_NAMES: &[&str] =
    &["prefix", "bindir", "libdir", "includedir", "datadir", "mandir", "localedir", "sysconfdir", "buildtype", "debug", "optimization", "werror", "warning_level", "default_library", "backend"];

pub fn private_dir(build_dir: &Path) -> std::path::PathBuf {
    build_dir.join("private")
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body)?;
    Ok(())
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> CliResult<T> {
    let body = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}

#[must_use]
pub fn prefixed_value(table: &OptionTable, name: &str) -> Option<String> {
    match table.prefixed_dir(name) {
        Some(dir) => Some(dir),
        None => match table.get(name).map(|d| &d.value) {
            Some(OptionValue::String(s)) => Some(s.clone()),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_table_splits_builtin_and_project_options() {
        let mut table = OptionTable::with_standard_options();
        table.declare(kiln_vm::OptionDef {
            name: "tests".to_string(),
            kind: kiln_vm::OptionType::Boolean,
            value: OptionValue::Boolean(true),
            source: kiln_vm::Source::Default,
            choices: None,
            min: None,
            max: None,
            yields: false,
            description: String::new(),
            deprecated: false,
            builtin: false,
        });
        let names = ["prefix", "tests"];
        let persisted = PersistedOptions::from_table(&table, &names);
        assert_eq!(persisted.global_opts.len(), 1);
        assert_eq!(persisted.global_opts[0].name, "prefix");
        assert_eq!(persisted.project_opts.len(), 1);
        assert_eq!(persisted.project_opts[0].name, "tests");
    }

    #[test]
    fn write_then_read_json_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        let manifest = InstallManifest { entries: vec![InstallEntry { src: "bin/kiln".to_string(), dest: "bin".to_string() }] };
        write_json(&path, &manifest).expect("write");
        let read: InstallManifest = read_json(&path).expect("read");
        assert_eq!(read.entries.len(), 1);
        assert_eq!(read.entries[0].src, "bin/kiln");
    }

    #[test]
    fn prefixed_value_falls_back_to_plain_string_option() {
        let table = OptionTable::with_standard_options();
        assert!(prefixed_value(&table, "bindir").is_some());
        assert!(prefixed_value(&table, "nonexistent-option").is_none());
    }
}
