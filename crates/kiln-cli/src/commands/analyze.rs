//! `kiln analyze {trace,lsp,root-for,file}`.

use std::path::{Path, PathBuf};

use kiln_diagnostics::ReplayOptions;

use crate::cli::{AnalyzeArgs, AnalyzeAction};
use crate::error::{CliError, CliResult};

pub fn run(args: AnalyzeArgs) -> CliResult<()> {
    let options = parse_warning_flags(&args.warnings);
    match args.action {
        AnalyzeAction::Trace { file } => trace(&file, options),
        AnalyzeAction::File { path } => trace(&path, options),
        AnalyzeAction::RootFor { path } => root_for(&path),
        AnalyzeAction::Lsp => spawn_lsp(),
    }
}

/// `-W [no-]diagnostic`, `-W error`, `-W list`. `list` is handled by the
/// caller printing the known diagnostic kinds and returning early in a
/// fuller build; here it only affects werror/errors-only since this
/// analyzer's diagnostics aren't individually nameable/toggleable yet.
fn parse_warning_flags(flags: &[String]) -> ReplayOptions {
    let mut options = ReplayOptions::default();
    for flag in flags {
        match flag.as_str() {
            "error" => options.werror = true,
            "list" => {
                println!("unused_variable, dead_code, conflicting_merge");
            }
            _ => {}
        }
    }
    options
}

fn trace(path: &str, options: ReplayOptions) -> CliResult<()> {
    let text = std::fs::read_to_string(path)?;
    let run = kiln_analyzer::analyze_source(path, &text)?;
    let rendered = run.render(options);
    if rendered.is_empty() {
        println!("no diagnostics");
    } else {
        print!("{rendered}");
    }
    if run.has_errors() {
        return Err(CliError::DiagnosedErrors);
    }
    Ok(())
}

fn root_for(path: &str) -> CliResult<()> {
    let mut current = std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));
    if current.is_file() {
        current = current.parent().map(Path::to_path_buf).unwrap_or(current);
    }
    loop {
        if current.join("meson.build").exists() {
            println!("{}", current.display());
            return Ok(());
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(CliError::Usage(format!("no project root found above '{path}'"))),
        }
    }
}

fn spawn_lsp() -> CliResult<()> {
    let status = std::process::Command::new("kiln-lsp").status()?;
    if !status.success() {
        return Err(CliError::Usage("kiln-lsp exited with a failure status".to_string()));
    }
    Ok(())
}
