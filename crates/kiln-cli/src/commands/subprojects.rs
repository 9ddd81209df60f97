//! `kiln subprojects {update,list,clean,fetch}`: operates on every
//! `*.wrap` file under `<source-dir>/subprojects`.

use std::path::{Path, PathBuf};

use colored::Colorize;
use kiln_wrap::{wrapfile, FetchOutcome, TarArchiveBackend, WrapResolver};

use crate::cli::{SubprojectsAction, SubprojectsArgs};
use crate::error::CliResult;

fn subprojects_dir(source_dir: &str) -> PathBuf {
    Path::new(source_dir).join("subprojects")
}

fn wrap_files(dir: &Path) -> CliResult<Vec<(String, wrapfile::WrapFile)>> {
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("wrap") {
            continue;
        }
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
        let text = std::fs::read_to_string(&path)?;
        let wrap = wrapfile::parse(&path.to_string_lossy(), &text)?;
        out.push((name, wrap));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

pub fn run(args: SubprojectsArgs) -> CliResult<()> {
    let dir = subprojects_dir(&args.source_dir);
    let wraps = wrap_files(&dir)?;

    match args.action {
        SubprojectsAction::List => {
            for (name, wrap) in &wraps {
                println!("{:<24} {:?}", name.bold(), wrap.kind);
            }
        }
        SubprojectsAction::Update | SubprojectsAction::Fetch => {
            let backend = TarArchiveBackend;
            let resolver = WrapResolver::new(dir.clone(), &backend);
            for (name, wrap) in &wraps {
                match resolver.handle(name, wrap) {
                    Ok(FetchOutcome::AlreadyPresent) => println!("{} {name}", "up to date".dimmed()),
                    Ok(FetchOutcome::Fetched) => println!("{} {name}", "fetched".green().bold()),
                    Err(err) => println!("{} {name}: {err}", "failed".red().bold()),
                }
            }
        }
        SubprojectsAction::Clean => {
            let backend = TarArchiveBackend;
            let resolver = WrapResolver::new(dir.clone(), &backend);
            for (name, wrap) in &wraps {
                let dest = resolver.dest_dir(name, wrap);
                if dest.exists() {
                    std::fs::remove_dir_all(&dest)?;
                    println!("{} {}", "removed".yellow().bold(), dest.display());
                }
            }
        }
    }
    Ok(())
}
