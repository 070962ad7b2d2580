//! Error types for the navigation layer.
//!
//! Lookup misses are never errors: `get`, `member` and region reads on a
//! group return `Ok(None)`. Everything here is a genuine failure of the
//! backend, the file, or the caller's index expression.

use std::io;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a container could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("file not found")]
    NotFound,

    #[error("permission denied")]
    Permission,

    #[error("invalid format: {0}")]
    FormatInvalid(String),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for OpenError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => OpenError::NotFound,
            io::ErrorKind::PermissionDenied => OpenError::Permission,
            _ => OpenError::Io(e),
        }
    }
}

/// Errors that can occur while opening, visiting or reading a container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file is missing, unreadable or corrupt.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: OpenError,
    },

    /// An enumerated entry is neither a group nor a dataset.
    #[error("cannot classify {0}: neither a group nor a dataset")]
    Classify(String),

    /// The backend failed while reading an object.
    #[error("backend error at {path}: {message}")]
    Backend { path: String, message: String },

    /// The object at the given path is not a dataset.
    #[error("not a dataset: {0}")]
    NotADataset(String),

    /// Malformed or out-of-bounds index expression.
    #[error("invalid selection: {0}")]
    Selection(String),

    /// An in-memory image failed validation.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The container has no open backend handle.
    #[error("file is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, source: impl Into<OpenError>) -> Self {
        Error::Open {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn backend(path: &str, message: impl std::fmt::Display) -> Self {
        Error::Backend {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_open_not_found() {
        let err = OpenError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, OpenError::NotFound));

        let err = OpenError::from(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(matches!(err, OpenError::Permission));

        let err = OpenError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(matches!(err, OpenError::Io(_)));
    }

    #[test]
    fn error_display() {
        let err = Error::open("data.h5", OpenError::NotFound);
        assert_eq!(err.to_string(), "cannot open data.h5: file not found");

        let err = Error::Classify("grp/odd".into());
        assert_eq!(
            err.to_string(),
            "cannot classify grp/odd: neither a group nor a dataset"
        );

        let err = Error::NotADataset("/grp".into());
        assert_eq!(err.to_string(), "not a dataset: /grp");

        let err = Error::backend("/x", "no such object");
        assert_eq!(err.to_string(), "backend error at /x: no such object");
    }
}
