//! A `[wrap-file]` entry resolved entirely from a pre-populated
//! `subprojects/packagefiles/` directory, with downloading switched off —
//! the offline/CI path `WrapResolver::allow_download = false` exists for.

use hex::encode;
use kiln_wrap::archive::TarArchiveBackend;
use kiln_wrap::resolve::{FetchOutcome, WrapResolver};
use kiln_wrap::wrapfile;
use sha2::{Digest, Sha256};

const BLOCK_SIZE: usize = 512;

fn write_octal(buf: &mut [u8], value: u64, width: usize) {
    let s = format!("{value:0>width$o}", width = width - 1);
    buf[..s.len()].copy_from_slice(s.as_bytes());
}

/// A minimal single-entry ustar archive, just enough for
/// `TarArchiveBackend` to unpack.
fn build_tar(name: &str, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut header = [0u8; BLOCK_SIZE];
    header[0..name.len()].copy_from_slice(name.as_bytes());
    write_octal(&mut header[124..136], content.len() as u64, 12);
    header[156] = b'0';
    out.extend_from_slice(&header);
    out.extend_from_slice(content);
    let pad = content.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE - content.len();
    out.extend(std::iter::repeat(0u8).take(pad));
    out.extend(std::iter::repeat(0u8).take(BLOCK_SIZE * 2));
    out
}

#[test]
fn resolves_from_packagefiles_without_touching_the_network() {
    let tmp = tempfile::tempdir().unwrap();
    let subprojects = tmp.path().join("subprojects");
    let packagefiles = subprojects.join("packagefiles");
    std::fs::create_dir_all(&packagefiles).unwrap();

    let tar = build_tar("foo-1.0/meson.build", b"project('foo')\n");
    let hash = encode(Sha256::digest(&tar));
    std::fs::write(packagefiles.join("foo.tar"), &tar).unwrap();

    let wrap_text = format!("[wrap-file]\nsource_filename=foo.tar\nsource_hash={hash}\n");
    let wrap = wrapfile::parse("foo.wrap", &wrap_text).unwrap();

    let backend = TarArchiveBackend;
    let resolver = WrapResolver { allow_download: false, ..WrapResolver::new(subprojects.clone(), &backend) };

    let outcome = resolver.handle("foo", &wrap).unwrap();
    assert_eq!(outcome, FetchOutcome::Fetched);

    let dest = resolver.dest_dir("foo", &wrap);
    assert_eq!(dest, subprojects.join("foo"));
    let meson_build = std::fs::read_to_string(dest.join("meson.build")).unwrap();
    assert_eq!(meson_build, "project('foo')\n");
}

#[test]
fn a_dest_dir_that_already_has_meson_build_short_circuits() {
    let tmp = tempfile::tempdir().unwrap();
    let subprojects = tmp.path().join("subprojects");
    std::fs::create_dir_all(subprojects.join("foo")).unwrap();
    std::fs::write(subprojects.join("foo").join("meson.build"), "project('already here')\n").unwrap();

    let wrap = wrapfile::parse("foo.wrap", "[wrap-file]\nsource_filename=foo.tar\n").unwrap();
    let backend = TarArchiveBackend;
    let resolver = WrapResolver { allow_download: false, ..WrapResolver::new(subprojects, &backend) };
    assert_eq!(resolver.handle("foo", &wrap).unwrap(), FetchOutcome::AlreadyPresent);
}
