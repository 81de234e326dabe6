//! Error taxonomy of the arithmetic layer.

use mpfloat_ntt::NttError;
use mpfloat_storage::StorageError;

/// Result alias for arithmetic operations.
pub type ApfloatResult<T> = Result<T, ApfloatError>;

/// Error type for arbitrary-precision arithmetic.
///
/// Arithmetic, precision and overflow errors surface to the caller
/// unchanged; transform and storage failures bubble up wrapped once.
/// Internal invariant violations are not errors but panics.
#[derive(Debug, thiserror::Error)]
pub enum ApfloatError {
    /// A mathematically undefined operation: zero divisor, zeroth root,
    /// even root of a negative number, inverse of zero.
    #[error("arithmetic error: {0}")]
    Arithmetic(&'static str),

    /// The requested precision is unusable: zero, or unbounded for an
    /// operation whose expansion never terminates.
    #[error("precision error: {0}")]
    Precision(&'static str),

    /// The result's exponent would exceed the representable range.
    #[error("overflow")]
    Overflow,

    /// The number string could not be parsed in the given radix.
    #[error("cannot parse \"{input}\" in radix {radix}")]
    Parse { input: String, radix: u32 },

    /// A transform-layer failure (length exceeded, invalid radix).
    #[error(transparent)]
    Ntt(#[from] NttError),

    /// A backing-storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
