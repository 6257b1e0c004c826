//! Error taxonomy for the file engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// All failure kinds the engine can report.
///
/// The front-end is expected to surface most of these as status messages;
/// `OutOfBounds` and `NotOpen` usually indicate a caller bug.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The path given to `open` does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but cannot be read.
    #[error("access denied: {0}")]
    AccessDenied(PathBuf),

    /// Any other mapping, reading or writing failure.
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    /// A read extends past the end of the file.
    #[error("read of {count} bytes at offset {offset} exceeds file size {file_size}")]
    OutOfBounds {
        offset: u64,
        count: u64,
        file_size: u64,
    },

    /// An operation was attempted without an open file.
    #[error("no file is open")]
    NotOpen,

    /// A cooperative task observed its cancel token.
    #[error("operation cancelled")]
    Cancelled,

    /// The search term is not a valid regular expression.
    #[error("invalid search pattern: {0}")]
    BadPattern(String),

    /// The OS refused to map or allocate the requested range.
    #[error("out of memory mapping {0} bytes")]
    OutOfMemory(u64),
}

impl EngineError {
    /// Classifies an `open(2)` failure against the path that caused it.
    pub fn from_open_error(err: io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => EngineError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => EngineError::AccessDenied(path.to_path_buf()),
            _ => EngineError::Io(err),
        }
    }

    /// Classifies a mapping failure for a window of `len` bytes.
    pub fn from_map_error(err: io::Error, len: u64) -> Self {
        match err.kind() {
            io::ErrorKind::OutOfMemory => EngineError::OutOfMemory(len),
            _ => EngineError::Io(err),
        }
    }

    /// Returns true for the cooperative-cancellation kind.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_open_error_classification() {
        let path = Path::new("/no/such/file");
        let err = EngineError::from_open_error(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, EngineError::NotFound(_)));

        let err =
            EngineError::from_open_error(io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(err, EngineError::AccessDenied(_)));

        let err = EngineError::from_open_error(io::Error::from(io::ErrorKind::Interrupted), path);
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn test_map_error_classification() {
        let err = EngineError::from_map_error(io::Error::from(io::ErrorKind::OutOfMemory), 4096);
        assert!(matches!(err, EngineError::OutOfMemory(4096)));
    }

    #[test]
    fn test_display_messages() {
        let err = EngineError::OutOfBounds {
            offset: 10,
            count: 20,
            file_size: 15,
        };
        assert_eq!(
            err.to_string(),
            "read of 20 bytes at offset 10 exceeds file size 15"
        );
        assert!(EngineError::Cancelled.is_cancelled());
        assert!(!EngineError::NotOpen.is_cancelled());
    }
}
