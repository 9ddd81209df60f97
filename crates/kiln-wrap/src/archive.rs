//! Archive extraction behind a small trait, the way the teacher puts a
//! trait in front of an external tool it doesn't want callers coupled to.
//! The default implementation here decodes gzip via `flate2` (a pure-Rust
//! DEFLATE implementation, not a libarchive binding) and walks a plain
//! ustar tar stream by hand — enough for the `.tar`/`.tar.gz` fixtures
//! wrap handling needs; real libarchive-backed formats (zip, xz, …) are
//! out of scope.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{WrapError, WrapResult};

const BLOCK_SIZE: usize = 512;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extracts archive bytes into `dest_dir`. Implementations own the
/// decision of which container/compression formats they understand.
pub trait ArchiveBackend {
    fn extract(&self, data: &[u8], dest_dir: &Path, lead_directory_missing: bool) -> WrapResult<()>;
}

/// Handles `.tar` and gzip-compressed `.tar.gz`/`.tgz`, sniffing the
/// gzip magic bytes rather than trusting the filename extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarArchiveBackend;

impl ArchiveBackend for TarArchiveBackend {
    fn extract(&self, data: &[u8], dest_dir: &Path, lead_directory_missing: bool) -> WrapResult<()> {
        let tar_bytes = if data.len() >= 2 && data[0..2] == GZIP_MAGIC {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(|e| WrapError::Archive(format!("gzip decode failed: {e}")))?;
            out
        } else {
            data.to_vec()
        };
        extract_tar(&tar_bytes, dest_dir, lead_directory_missing)
    }
}

struct TarHeader {
    name: String,
    size: u64,
    typeflag: u8,
}

fn parse_octal(field: &[u8]) -> u64 {
    let s = std::str::from_utf8(field).unwrap_or("").trim_matches(|c: char| c == '\0' || c.is_whitespace());
    u64::from_str_radix(s, 8).unwrap_or(0)
}

fn parse_cstr(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn read_header(block: &[u8]) -> Option<TarHeader> {
    if block.iter().all(|&b| b == 0) {
        return None;
    }
    let name = parse_cstr(&block[0..100]);
    let size = parse_octal(&block[124..136]);
    let typeflag = block[156];
    let prefix = parse_cstr(&block[345..500]);
    let full_name = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
    Some(TarHeader { name: full_name, size, typeflag })
}

fn strip_lead_component(path: &str) -> Option<&str> {
    path.split_once('/').map(|(_, rest)| rest)
}

fn extract_tar(bytes: &[u8], dest_dir: &Path, lead_directory_missing: bool) -> WrapResult<()> {
    let mut offset = 0usize;
    while offset + BLOCK_SIZE <= bytes.len() {
        let Some(header) = read_header(&bytes[offset..offset + BLOCK_SIZE]) else {
            break;
        };
        offset += BLOCK_SIZE;

        let size = header.size as usize;
        let content = bytes.get(offset..offset + size).ok_or_else(|| WrapError::Archive("truncated tar entry".to_string()))?;
        let padded = size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        offset += padded;

        let rel = if lead_directory_missing { Some(header.name.as_str()) } else { strip_lead_component(&header.name) };
        let Some(rel) = rel else { continue };
        if rel.is_empty() {
            continue;
        }
        let target = sanitize_join(dest_dir, rel)?;

        match header.typeflag {
            b'5' => fs::create_dir_all(&target)?,
            b'0' | 0 => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, content)?;
            }
            // Symlinks, hardlinks, and other GNU/PAX extensions aren't
            // needed by the wrap fixtures this backend targets.
            _ => {}
        }
    }
    Ok(())
}

/// Joins `rel` onto `dest_dir`, rejecting `..` components so a malicious
/// archive can't write outside the destination.
fn sanitize_join(dest_dir: &Path, rel: &str) -> WrapResult<PathBuf> {
    let mut out = dest_dir.to_path_buf();
    for component in rel.split('/') {
        if component.is_empty() || component == "." {
            continue;
        }
        if component == ".." {
            return Err(WrapError::Archive(format!("archive entry escapes destination: '{rel}'")));
        }
        out.push(component);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_octal(buf: &mut [u8], value: u64, width: usize) {
        let s = format!("{value:0>width$o}", width = width - 1);
        buf[..s.len()].copy_from_slice(s.as_bytes());
    }

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, content) in entries {
            let mut header = [0u8; BLOCK_SIZE];
            header[0..name.len()].copy_from_slice(name.as_bytes());
            write_octal(&mut header[124..136], content.len() as u64, 12);
            header[156] = b'0';
            out.extend_from_slice(&header);
            out.extend_from_slice(content);
            let pad = content.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE - content.len();
            out.extend(std::iter::repeat(0u8).take(pad));
        }
        out.extend(std::iter::repeat(0u8).take(BLOCK_SIZE * 2));
        out
    }

    #[test]
    fn strips_lead_directory_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let tar = build_tar(&[("proj-1.0/meson.build", b"project('x')")]);
        TarArchiveBackend.extract(&tar, tmp.path(), false).unwrap();
        assert!(tmp.path().join("meson.build").exists());
    }

    #[test]
    fn keeps_full_path_when_lead_directory_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let tar = build_tar(&[("meson.build", b"project('x')")]);
        TarArchiveBackend.extract(&tar, tmp.path(), true).unwrap();
        assert!(tmp.path().join("meson.build").exists());
    }

    #[test]
    fn rejects_path_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let tar = build_tar(&[("proj-1.0/../../evil", b"oops")]);
        assert!(TarArchiveBackend.extract(&tar, tmp.path(), false).is_err());
    }
}
