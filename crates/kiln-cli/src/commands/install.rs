//! `kiln install`: replays the install manifest `setup` persisted,
//! copying each installed target under `destdir`/`prefix`. There is no
//! Ninja backend in scope to have actually built anything, so a target
//! whose declared source isn't present on disk is reported, not treated
//! as a hard failure — the manifest describes intent, the same way real
//! Meson's install step is driven by a prior build.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::cli::InstallArgs;
use crate::error::{CliError, CliResult};
use crate::persist::{self, InstallManifest};

pub fn run(args: InstallArgs) -> CliResult<()> {
    let build_dir = Path::new(&args.build_dir);
    let private = persist::private_dir(build_dir);
    let manifest_path = private.join("install-manifest.json");
    if !manifest_path.exists() {
        return Err(CliError::Usage(format!("{} is not configured; run setup first", args.build_dir)));
    }
    let manifest: InstallManifest = persist::read_json(&manifest_path)?;

    let destdir = args.destdir.or_else(|| std::env::var("DESTDIR").ok());
    let base: PathBuf = match &destdir {
        Some(d) => PathBuf::from(d),
        None => PathBuf::from("/"),
    };

    if manifest.entries.is_empty() {
        println!("{}", "nothing to install".dimmed());
        return Ok(());
    }

    for entry in &manifest.entries {
        let dest = base.join(entry.dest.trim_start_matches('/')).join(&entry.src);
        if args.dry_run {
            println!("{} {} -> {}", "would install".cyan(), entry.src, dest.display());
            continue;
        }
        let candidate = build_dir.join(&entry.src);
        if candidate.exists() {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&candidate, &dest)?;
            println!("{} {} -> {}", "installed".green().bold(), entry.src, dest.display());
        } else {
            println!("{} {} ({} not built)", "skipped".yellow(), entry.src, candidate.display());
        }
    }
    Ok(())
}
