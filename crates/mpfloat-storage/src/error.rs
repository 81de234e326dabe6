//! Storage-level error type.

use std::path::PathBuf;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error type for data storage operations.
///
/// I/O failures always carry the filename of the backing file so the
/// caller can report which temporary file went bad.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An I/O operation on a backing file failed.
    #[error("backing storage failure on \"{file}\": {source}")]
    Io {
        /// The backing file the operation was issued against.
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested array view exceeds the configured block budget.
    #[error("requested block of {requested} elements exceeds the block budget of {budget}")]
    BlockSizeExceeded { requested: usize, budget: usize },

    /// An access was issued outside the bounds of the storage.
    #[error("access at {offset}..{end} outside storage of size {size}")]
    OutOfBounds { offset: u64, end: u64, size: u64 },

    /// A resize was attempted on a subsequence view.
    #[error("cannot resize a subsequence view")]
    ResizeSubsequence,

    /// A write was attempted through a read-only handle.
    #[error("storage is read-only")]
    ReadOnly,
}

impl StorageError {
    pub(crate) fn io(file: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            file: file.into(),
            source,
        }
    }
}
