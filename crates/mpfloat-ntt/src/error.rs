//! Transform-level error type.

use mpfloat_storage::StorageError;

/// Result alias for transform operations.
pub type NttResult<T> = Result<T, NttError>;

/// Error type for the NTT convolution pipeline.
#[derive(Debug, thiserror::Error)]
pub enum NttError {
    /// The requested transform length exceeds the prime's `2^m` ceiling.
    #[error("maximum transform length exceeded: {length} > {max}")]
    TransformLengthExceeded { length: u64, max: u64 },

    /// The transform length exceeds the addressable array size.
    #[error("maximum array length exceeded: {length}")]
    ArrayLengthExceeded { length: u64 },

    /// The radix is outside the supported 2..=36 range.
    #[error("invalid radix {0}, expected 2..=36")]
    InvalidRadix(u32),

    /// A backing-storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
