//! Wrap handling: dest-dir computation, fetch/checksum/extract for
//! `wrap-file`, clone/checkout for `wrap-git`, and patch application.
//!
//! Blocking I/O throughout — the VM core stays synchronous, and wrap
//! handling only ever runs during `setup`/`subprojects download`, never
//! mid-evaluation.

use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

use crate::archive::ArchiveBackend;
use crate::error::{WrapError, WrapResult};
use crate::wrapfile::{WrapFile, WrapKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// `<dest_dir>/meson.build` already existed; no work was done.
    AlreadyPresent,
    Fetched,
}

pub struct WrapResolver<'a> {
    pub subprojects_dir: PathBuf,
    pub backend: &'a dyn ArchiveBackend,
    /// Set `false` in offline/CI contexts to force packagefiles-only
    /// resolution; a download attempt with this unset surfaces as a
    /// `WrapError::Fetch`.
    pub allow_download: bool,
}

impl<'a> WrapResolver<'a> {
    #[must_use]
    pub fn new(subprojects_dir: PathBuf, backend: &'a dyn ArchiveBackend) -> Self {
        Self { subprojects_dir, backend, allow_download: true }
    }

    #[must_use]
    pub fn dest_dir(&self, wrap_name: &str, wrap: &WrapFile) -> PathBuf {
        let dir_name = wrap.directory.clone().unwrap_or_else(|| wrap_name.to_string());
        self.subprojects_dir.join(dir_name)
    }

    pub fn handle(&self, wrap_name: &str, wrap: &WrapFile) -> WrapResult<FetchOutcome> {
        let dest_dir = self.dest_dir(wrap_name, wrap);
        if dest_dir.join("meson.build").exists() {
            return Ok(FetchOutcome::AlreadyPresent);
        }

        tracing::info!(wrap = wrap_name, dir = %dest_dir.display(), "fetching subproject");
        match wrap.kind {
            Some(WrapKind::File) => self.handle_file(wrap, &dest_dir)?,
            Some(WrapKind::Git) => self.handle_git(wrap, &dest_dir)?,
            None => unreachable!("WrapFile::kind validated non-None at parse time"),
        }

        self.apply_patch(wrap, &dest_dir)?;
        Ok(FetchOutcome::Fetched)
    }

    fn handle_file(&self, wrap: &WrapFile, dest_dir: &Path) -> WrapResult<()> {
        let Some(filename) = &wrap.source_filename else {
            return Err(WrapError::Archive("wrap-file has no source_filename".to_string()));
        };
        let data = self.resolve_packagefile(filename, wrap.source_url.as_deref(), wrap.source_hash.as_deref())?;
        std::fs::create_dir_all(dest_dir)?;
        self.backend.extract(&data, dest_dir, wrap.lead_directory_missing())
    }

    fn handle_git(&self, wrap: &WrapFile, dest_dir: &Path) -> WrapResult<()> {
        let url = wrap.url.as_deref().expect("validated at parse time");
        let revision = wrap.revision.as_deref().expect("validated at parse time");

        run_git(&["clone", url, &dest_dir.to_string_lossy()], None)?;
        if matches!(wrap.clone_recursive.as_deref(), Some("true")) {
            run_git(&["submodule", "update", "--init", "--recursive"], Some(dest_dir))?;
        }
        run_git(&["-c", "advice.detachedHead=false", "checkout", revision, "--"], Some(dest_dir))?;
        Ok(())
    }

    fn apply_patch(&self, wrap: &WrapFile, dest_dir: &Path) -> WrapResult<()> {
        if let Some(patch_dir) = &wrap.patch_directory {
            let source = self.packagefiles_dir().join(patch_dir);
            copy_dir_recursive(&source, dest_dir)?;
        } else if let Some(filename) = &wrap.patch_filename {
            let data = self.resolve_packagefile(filename, wrap.patch_url.as_deref(), wrap.patch_hash.as_deref())?;
            self.backend.extract(&data, dest_dir, false)?;
        }

        for diff_file in wrap.diff_file_list() {
            let diff_path = self.packagefiles_dir().join(&diff_file);
            apply_diff(&diff_path, dest_dir)?;
        }
        Ok(())
    }

    fn packagefiles_dir(&self) -> PathBuf {
        self.subprojects_dir.join("packagefiles")
    }

    /// Prefers a local file under `subprojects/packagefiles/`, falling
    /// back to downloading `url`. Verifies `hash` (lowercase hex sha256)
    /// against whichever source was used, when one is given.
    fn resolve_packagefile(&self, filename: &str, url: Option<&str>, hash: Option<&str>) -> WrapResult<Vec<u8>> {
        let local = self.packagefiles_dir().join(filename);
        let data = if local.exists() {
            std::fs::read(&local)?
        } else if let Some(url) = url {
            if !self.allow_download {
                return Err(WrapError::Fetch(url.to_string(), "downloading is disabled".to_string()));
            }
            download(url)?
        } else {
            return Err(WrapError::Io(format!("'{}' not found and no source_url given", local.display())));
        };

        if let Some(hash) = hash {
            verify_checksum(&data, hash, filename)?;
        }
        Ok(data)
    }
}

fn verify_checksum(data: &[u8], expected_hex: &str, file: &str) -> WrapResult<()> {
    if expected_hex.len() != 64 || !expected_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(WrapError::BadHash(expected_hex.to_string()));
    }
    let actual = hex::encode(Sha256::digest(data));
    if !actual.eq_ignore_ascii_case(expected_hex) {
        return Err(WrapError::ChecksumMismatch { file: file.to_string(), expected: expected_hex.to_string(), actual });
    }
    Ok(())
}

fn download(url: &str) -> WrapResult<Vec<u8>> {
    tracing::debug!(url, "downloading");
    let response = reqwest::blocking::get(url).map_err(|e| WrapError::Fetch(url.to_string(), e.to_string()))?;
    let bytes = response.bytes().map_err(|e| WrapError::Fetch(url.to_string(), e.to_string()))?;
    Ok(bytes.to_vec())
}

fn run_git(args: &[&str], chdir: Option<&Path>) -> WrapResult<()> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = chdir {
        cmd.current_dir(dir);
    }
    let status = cmd.status().map_err(|e| WrapError::Git(e.to_string()))?;
    if !status.success() {
        return Err(WrapError::Git(format!("git {} exited with {status}", args.join(" "))));
    }
    Ok(())
}

/// Applies one unified-diff file under `dest_dir` via the system `patch`
/// command, falling back to `git apply` when `patch` isn't on `PATH`.
fn apply_diff(diff_path: &Path, dest_dir: &Path) -> WrapResult<()> {
    let diff_bytes = std::fs::read(diff_path)?;
    if which("patch") {
        use std::io::Write;
        let mut child = Command::new("patch")
            .args(["-p1"])
            .current_dir(dest_dir)
            .stdin(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| WrapError::Git(e.to_string()))?;
        child.stdin.take().expect("piped stdin").write_all(&diff_bytes)?;
        let status = child.wait().map_err(|e| WrapError::Git(e.to_string()))?;
        if !status.success() {
            return Err(WrapError::Git(format!("patch -p1 exited with {status}")));
        }
    } else {
        run_git(&["--work-tree", ".", "apply", "-p1", &diff_path.to_string_lossy()], Some(dest_dir))?;
    }
    Ok(())
}

fn which(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> WrapResult<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TarArchiveBackend;
    use crate::wrapfile;

    #[test]
    fn already_present_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("subprojects").join("foo");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("meson.build"), "project('x')").unwrap();

        let backend = TarArchiveBackend;
        let resolver = WrapResolver::new(tmp.path().join("subprojects"), &backend);
        let wrap = wrapfile::parse("foo.wrap", "[wrap-file]\nsource_filename=foo.tar\n").unwrap();
        assert_eq!(resolver.handle("foo", &wrap).unwrap(), FetchOutcome::AlreadyPresent);
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let data = b"hello world";
        let wrong = "0".repeat(64);
        assert!(verify_checksum(data, &wrong, "f").is_err());
    }

    #[test]
    fn checksum_match_succeeds() {
        let data = b"hello world";
        let digest = hex::encode(Sha256::digest(data));
        assert!(verify_checksum(data, &digest, "f").is_ok());
    }
}
