//! # Kiln Wrap
//!
//! `.wrap` file parsing, `[provide]` resolution, and archive fetch/extract
//! for subprojects.
//!
//! ## Architecture
//!
//! 1. [`wrapfile`] — INI parsing into a [`wrapfile::WrapFile`].
//! 2. [`provide`] — per-project dependency/program name -> subproject maps.
//! 3. [`archive`] — the [`archive::ArchiveBackend`] trait and its tar/gzip
//!    default implementation.
//! 4. [`resolve`] — dest-dir computation, fetch, checksum, extract, patch.
//! 5. [`error`] — this crate's own error type.

pub mod archive;
pub mod error;
pub mod provide;
pub mod resolve;
pub mod wrapfile;

pub use archive::{ArchiveBackend, TarArchiveBackend};
pub use error::{WrapError, WrapResult};
pub use provide::{Overridden, ProvideMap};
pub use resolve::{FetchOutcome, WrapResolver};
pub use wrapfile::{Provides, WrapFile, WrapKind};
