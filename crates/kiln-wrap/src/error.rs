//! Wrap handling's own error type: INI parse failures, field validation,
//! checksum mismatches, and fetch/extract failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WrapError {
    #[error("{path}:{line}: invalid section '{section}'")]
    InvalidSection { path: String, line: usize, section: String },

    #[error("{path}:{line}: invalid key '{key}'")]
    InvalidKey { path: String, line: usize, key: String },

    #[error("{path}:{line}: duplicate key '{key}'")]
    DuplicateKey { path: String, line: usize, key: String },

    #[error("{path}: key '{key}' appears outside any section")]
    KeyOutsideSection { path: String, key: String },

    #[error("{path}: wrap has no [wrap-file] or [wrap-git] section")]
    MissingType { path: String },

    #[error("{path}: [wrap-file] and [wrap-git] sections are mutually exclusive")]
    ConflictingTypes { path: String },

    #[error("{path}: 'source_filename' is required when 'source_url' is set")]
    MissingSourceFilename { path: String },

    #[error("{path}: [wrap-git] requires both 'url' and 'revision'")]
    IncompleteGit { path: String },

    #[error("{path}: 'patch_directory' and 'patch_filename' are mutually exclusive")]
    ConflictingPatch { path: String },

    #[error("checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch { file: String, expected: String, actual: String },

    #[error("'{0}' is not a valid lowercase hex sha256 digest")]
    BadHash(String),

    #[error("no such subproject '{0}'")]
    NoSuchSubproject(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("fetch failed for '{0}': {1}")]
    Fetch(String, String),

    #[error("git command failed: {0}")]
    Git(String),
}

impl From<std::io::Error> for WrapError {
    fn from(err: std::io::Error) -> Self {
        WrapError::Io(err.to_string())
    }
}

pub type WrapResult<T> = Result<T, WrapError>;
