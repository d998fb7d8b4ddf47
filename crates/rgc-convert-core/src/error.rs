//! Error types for rgc-convert-core

use thiserror::Error;

/// Main error type for conversion operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("Failed to read/write ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Unsupported archive format: {name}")]
    UnsupportedArchive { name: String },

    #[error("Chart error in {path}: {source}")]
    Chart {
        path: String,
        #[source]
        source: ChartError,
    },

    #[error("Libraries not initialized. Call initialize() first")]
    UninitializedAccess,

    #[error("Conversion library is not ready")]
    LibraryNotReady,

    #[error("Failed to load library bundle: {0}")]
    LibraryLoad(String),

    #[error("No maps parsed. Please import a map first")]
    NothingToConvert,

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by a [`VirtualFs`](crate::vfs::VirtualFs) implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl FsError {
    /// True for the "does not exist" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

/// Errors raised by chart parsers and writers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("missing section: {0}")]
    MissingSection(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("unsupported key count: {0}")]
    UnsupportedKeyCount(u8),

    #[error("unsupported game mode: {0}")]
    UnsupportedMode(String),

    #[error("{0}")]
    Malformed(String),
}

impl ChartError {
    pub(crate) fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_not_found() {
        assert!(FsError::NotFound("/a".into()).is_not_found());
        assert!(!FsError::AlreadyExists("/a".into()).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::Chart {
            path: "/MapImport/set/a.osu".into(),
            source: ChartError::MissingSection("HitObjects"),
        };
        assert_eq!(
            err.to_string(),
            "Chart error in /MapImport/set/a.osu: missing section: HitObjects"
        );
        assert_eq!(
            Error::NothingToConvert.to_string(),
            "No maps parsed. Please import a map first"
        );
    }
}
