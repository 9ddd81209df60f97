//! The option/override resolution system.
//!
//! One [`Option`] record per declared (or built-in) option: its type,
//! current value, *where* that value came from (tracked so a later,
//! lower-precedence write never clobbers an earlier, higher-precedence
//! one), and the metadata `get_option`/`-Dname=value`/introspection need.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// Where an option's current value came from, ordered low to high —
/// `source` only ever moves rightward (`OptionTable::set` enforces this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Source {
    Unset,
    Default,
    Environment,
    DefaultOptions,
    SubprojectDefaultOptions,
    Yield,
    CommandLine,
    OverrideOptions,
    DeprecatedRename,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionType {
    String,
    Boolean,
    Combo,
    Integer,
    Array,
    Feature,
    ShellArray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Array(Vec<String>),
    Feature(Feature),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Auto,
    Enabled,
    Disabled,
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Array(items) => write!(f, "[{}]", items.join(",")),
            Self::Feature(Feature::Auto) => write!(f, "auto"),
            Self::Feature(Feature::Enabled) => write!(f, "enabled"),
            Self::Feature(Feature::Disabled) => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptionDef {
    pub name: String,
    pub kind: OptionType,
    pub value: OptionValue,
    pub source: Source,
    pub choices: Option<Vec<String>>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub yields: bool,
    pub description: String,
    pub deprecated: bool,
    /// Built-in (`prefix`, `buildtype`, …) vs. project-declared
    /// (`meson_options.txt`) — introspection reports this separately.
    pub builtin: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option '{0}'")]
    Unknown(String),
    #[error("no such subproject '{0}'")]
    NoSuchSubproject(String),
    #[error("value '{value}' is not valid for option '{name}' of type {kind:?}")]
    InvalidValue { name: String, value: String, kind: OptionType },
    #[error("value {value} for option '{name}' is out of range [{min:?}, {max:?}]")]
    OutOfRange { name: String, value: i64, min: Option<i64>, max: Option<i64> },
}

/// Every option known to one workspace, keyed `subproject:name` (empty
/// subproject prefix for the top-level project).
#[derive(Debug, Default)]
pub struct OptionTable {
    options: IndexMap<String, OptionDef>,
}

impl OptionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the standard directory options (`prefix`, `bindir`, …)
    /// and build options (`buildtype`, `debug`, …) every downstream
    /// consumer (the introspection JSON writer) actually reads.
    #[must_use]
    pub fn with_standard_options() -> Self {
        let mut table = Self::new();
        let dirs = [
            ("prefix", "/usr/local"),
            ("bindir", "bin"),
            ("libdir", "lib"),
            ("includedir", "include"),
            ("datadir", "share"),
            ("mandir", "share/man"),
            ("localedir", "share/locale"),
            ("sysconfdir", "etc"),
        ];
        for (name, default) in dirs {
            table.declare_builtin(name, OptionType::String, OptionValue::String(default.to_string()));
        }
        table.declare_builtin(
            "buildtype",
            OptionType::Combo,
            OptionValue::String("debug".to_string()),
        );
        table.declare_builtin("debug", OptionType::Boolean, OptionValue::Boolean(true));
        table.declare_builtin("optimization", OptionType::Combo, OptionValue::String("0".to_string()));
        table.declare_builtin("werror", OptionType::Boolean, OptionValue::Boolean(false));
        table.declare_builtin("warning_level", OptionType::Combo, OptionValue::String("1".to_string()));
        table.declare_builtin(
            "default_library",
            OptionType::Combo,
            OptionValue::String("shared".to_string()),
        );
        table.declare_builtin("backend", OptionType::Combo, OptionValue::String("ninja".to_string()));
        table
    }

    fn declare_builtin(&mut self, name: &str, kind: OptionType, value: OptionValue) {
        self.options.insert(
            name.to_string(),
            OptionDef {
                name: name.to_string(),
                kind,
                value,
                source: Source::Default,
                choices: None,
                min: None,
                max: None,
                yields: false,
                description: String::new(),
                deprecated: false,
                builtin: true,
            },
        );
    }

    /// Declares a project option from `meson_options.txt`; a re-declaration
    /// of an existing name is ignored (the first `option()` call wins, as
    /// in real Meson).
    pub fn declare(&mut self, def: OptionDef) {
        self.options.entry(def.name.clone()).or_insert(def);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionDef> {
        self.options.get(name)
    }

    /// Writes `value` under `source`, honoring monotonic precedence: a
    /// write from a lower-precedence source than the option's current
    /// source is silently ignored (matches the spec's "monotonic writes").
    pub fn set(&mut self, name: &str, value: OptionValue, source: Source) -> Result<(), OptionError> {
        let def = self.options.get_mut(name).ok_or_else(|| OptionError::Unknown(name.to_string()))?;
        if source < def.source {
            return Ok(());
        }
        if let Some(choices) = &def.choices {
            if let OptionValue::String(s) = &value {
                if !choices.contains(s) {
                    return Err(OptionError::InvalidValue { name: name.to_string(), value: s.clone(), kind: def.kind.clone() });
                }
            }
        }
        if let (OptionValue::Integer(n), Some(min), Some(max)) = (&value, def.min, def.max) {
            if *n < min || *n > max {
                return Err(OptionError::OutOfRange { name: name.to_string(), value: *n, min: def.min, max: def.max });
            }
        }
        def.value = value;
        def.source = source;
        Ok(())
    }

    /// Parses a `-Dname=value` / `-Dsubproject:name=value` command-line
    /// override.
    pub fn set_from_command_line(&mut self, arg: &str) -> Result<(), OptionError> {
        let (name, value) = arg.split_once('=').ok_or_else(|| OptionError::Unknown(arg.to_string()))?;
        let coerced = match self.get(name) {
            Some(def) => coerce(&def.kind, value),
            None => OptionValue::String(value.to_string()),
        };
        self.set(name, coerced, Source::CommandLine)
    }

    /// Rebases a path-typed directory option under the effective `prefix`,
    /// unless it was given as an absolute path.
    #[must_use]
    pub fn prefixed_dir(&self, name: &str) -> Option<String> {
        let def = self.get(name)?;
        let OptionValue::String(rel) = &def.value else { return None };
        if rel.starts_with('/') {
            return Some(rel.clone());
        }
        let prefix = match self.get("prefix")?.value.clone() {
            OptionValue::String(p) => p,
            _ => return None,
        };
        Some(format!("{}/{}", prefix.trim_end_matches('/'), rel))
    }
}

fn coerce(kind: &OptionType, raw: &str) -> OptionValue {
    match kind {
        OptionType::Boolean => OptionValue::Boolean(raw == "true"),
        OptionType::Integer => OptionValue::Integer(raw.parse().unwrap_or(0)),
        OptionType::Array | OptionType::ShellArray => OptionValue::Array(raw.split(',').map(str::to_string).collect()),
        OptionType::Feature => OptionValue::Feature(match raw {
            "enabled" => Feature::Enabled,
            "disabled" => Feature::Disabled,
            _ => Feature::Auto,
        }),
        OptionType::String | OptionType::Combo => OptionValue::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_options_are_declared() {
        let table = OptionTable::with_standard_options();
        assert!(table.get("prefix").is_some());
        assert!(table.get("buildtype").is_some());
    }

    #[test]
    fn lower_precedence_write_is_ignored() {
        let mut table = OptionTable::with_standard_options();
        table.set("debug", OptionValue::Boolean(false), Source::CommandLine).unwrap();
        table.set("debug", OptionValue::Boolean(true), Source::Environment).unwrap();
        assert_eq!(table.get("debug").unwrap().value, OptionValue::Boolean(false));
    }

    #[test]
    fn unknown_option_errors() {
        let mut table = OptionTable::with_standard_options();
        assert!(table.set("nonexistent", OptionValue::Boolean(true), Source::CommandLine).is_err());
    }

    #[test]
    fn prefixed_dir_rebases_relative_path() {
        let mut table = OptionTable::with_standard_options();
        table.set("prefix", OptionValue::String("/opt".to_string()), Source::CommandLine).unwrap();
        assert_eq!(table.prefixed_dir("bindir"), Some("/opt/bin".to_string()));
    }

    const SOURCES: [Source; 9] = [
        Source::Unset,
        Source::Default,
        Source::Environment,
        Source::DefaultOptions,
        Source::SubprojectDefaultOptions,
        Source::Yield,
        Source::CommandLine,
        Source::OverrideOptions,
        Source::DeprecatedRename,
    ];

    fn source_and_value() -> impl proptest::strategy::Strategy<Value = (usize, bool)> {
        (0usize..SOURCES.len(), proptest::bool::ANY)
    }

    proptest::proptest! {
        /// For any sequence of `(source, value)` writes, the option's final
        /// value is the value of the write with the highest-precedence
        /// source, ties broken by the later write; lower-precedence writes
        /// never change the value once a higher source has written.
        #[test]
        fn final_value_is_the_highest_precedence_write(
            writes in proptest::collection::vec(source_and_value(), 1..30),
        ) {
            let mut table = OptionTable::with_standard_options();
            let mut best: Option<(usize, bool)> = None;
            for (src_idx, value) in &writes {
                let source = SOURCES[*src_idx];
                table.set("debug", OptionValue::Boolean(*value), source).unwrap();
                match best {
                    Some((best_idx, _)) if *src_idx < best_idx => {}
                    _ => best = Some((*src_idx, *value)),
                }
            }
            let (_, expected) = best.unwrap();
            proptest::prop_assert_eq!(table.get("debug").unwrap().value, OptionValue::Boolean(expected));
        }
    }
}
