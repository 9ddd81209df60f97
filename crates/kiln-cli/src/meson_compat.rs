//! A `meson` front-end alias: translates Meson's own CLI vocabulary into
//! this tool's before `clap` ever sees it, so a build script (or a
//! symlink named `meson`) written against the reference tool keeps
//! working unchanged. Triggered by `argv[0]`'s basename being `meson`;
//! under any other name the argv passes through untouched.

use std::path::Path;

use crate::error::CliResult;
use crate::persist;

/// Long options on `meson setup` that map onto `-D<name>=<value>`.
const SETUP_OPTION_FLAGS: &[&str] = &["prefix", "bindir", "libdir", "includedir", "datadir", "mandir", "localedir", "sysconfdir", "buildtype", "default-library", "warning-level"];

const MESON_COMPAT_VERSION: &str = "1.0.0";

pub enum Dispatch {
    /// Argv to feed into `Cli::parse_from`, `kiln`'s own vocabulary.
    Native(Vec<String>),
    /// Already fully handled (printed and/or side-effected); `main`
    /// should exit 0 without touching `clap` at all.
    Handled,
}

pub fn translate(argv: &[String]) -> CliResult<Dispatch> {
    let invoked_as_meson = argv.first().map(|a| Path::new(a).file_stem().and_then(|s| s.to_str()) == Some("meson")).unwrap_or(false);
    if !invoked_as_meson {
        return Ok(Dispatch::Native(argv.to_vec()));
    }

    let rest = &argv[1..];
    match rest.first().map(String::as_str) {
        Some("-v") | Some("--version") => {
            println!("{MESON_COMPAT_VERSION}");
            Ok(Dispatch::Handled)
        }
        Some("introspect") => {
            introspect(&rest[1..])?;
            Ok(Dispatch::Handled)
        }
        Some("setup") => Ok(Dispatch::Native(translate_setup(rest))),
        _ => {
            let mut native = vec!["kiln".to_string()];
            native.extend(rest.iter().cloned());
            Ok(Dispatch::Native(native))
        }
    }
}

/// `meson setup builddir --prefix /usr --buildtype release` becomes
/// `kiln setup builddir -Dprefix=/usr -Dbuildtype=release`; everything
/// that isn't one of the known long option flags (positionals, an
/// already-native `-Dname=value`, `--reconfigure`) passes through as-is.
fn translate_setup(rest: &[String]) -> Vec<String> {
    let mut out = vec!["kiln".to_string(), "setup".to_string()];
    let mut iter = rest[1..].iter();
    while let Some(arg) = iter.next() {
        if let Some(flag) = arg.strip_prefix("--") {
            if SETUP_OPTION_FLAGS.contains(&flag) {
                if let Some(value) = iter.next() {
                    out.push(format!("-D{flag}={value}"));
                    continue;
                }
            }
        }
        out.push(arg.clone());
    }
    out
}

/// `introspect --targets --buildoptions builddir` concatenates the
/// matching cached JSON files `kiln setup` already persisted rather than
/// recomputing anything, the same shortcut the reference tool's own
/// `introspect` takes against its cache.
fn introspect(rest: &[String]) -> CliResult<()> {
    let mut wants = Vec::new();
    let mut build_dir = "build".to_string();
    for arg in rest {
        match arg.as_str() {
            "--targets" => wants.push("intro-targets.json"),
            "--buildoptions" => wants.push("intro-buildoptions.json"),
            _ if !arg.starts_with('-') => build_dir = arg.clone(),
            _ => {}
        }
    }

    let private = persist::private_dir(Path::new(&build_dir));
    let mut out = serde_json::Map::new();
    for file in wants {
        let path = private.join(file);
        if path.exists() {
            let body = std::fs::read_to_string(&path)?;
            let value: serde_json::Value = serde_json::from_str(&body)?;
            out.insert(file.trim_end_matches(".json").to_string(), value);
        }
    }
    println!("{}", serde_json::to_string_pretty(&serde_json::Value::Object(out))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn native_binary_name_passes_argv_through_untouched() {
        let argv = strs(&["kiln", "setup", "build", "--prefix", "/usr"]);
        match translate(&argv).expect("translate") {
            Dispatch::Native(out) => assert_eq!(out, argv),
            Dispatch::Handled => panic!("expected passthrough"),
        }
    }

    #[test]
    fn meson_setup_rewrites_known_long_flags_to_dashd() {
        let argv = strs(&["/usr/bin/meson", "setup", "build", "--prefix", "/usr", "--reconfigure"]);
        match translate(&argv).expect("translate") {
            Dispatch::Native(out) => {
                assert_eq!(out, strs(&["kiln", "setup", "build", "-Dprefix=/usr", "--reconfigure"]));
            }
            Dispatch::Handled => panic!("expected native dispatch"),
        }
    }

    #[test]
    fn meson_version_flag_is_handled_directly() {
        let argv = strs(&["meson", "--version"]);
        assert!(matches!(translate(&argv).expect("translate"), Dispatch::Handled));
    }
}
