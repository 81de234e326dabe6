//! The transform strategy protocol.

use mpfloat_storage::DataStorage;

use crate::element::NttElement;
use crate::error::NttResult;

/// A Number Theoretic Transform over a digit storage.
///
/// Implementations cover the three size regimes (in-cache table
/// transform, in-memory six-step, disk-backed two-pass) plus the
/// factor-3 wrappers. Forward and inverse of the *same* strategy always
/// compose to the identity; the intermediate digit order is strategy
/// private, which is fine because pointwise products are taken between
/// transforms of the same strategy.
pub trait NttStrategy<E: NttElement>: Send + Sync {
    /// Forward-transform `storage` in place under modulus `modulus`.
    fn transform(&self, storage: &DataStorage<E>, modulus: usize) -> NttResult<()>;

    /// Inverse-transform `storage` in place under modulus `modulus`,
    /// dividing through by `total_transform_length`.
    fn inverse_transform(
        &self,
        storage: &DataStorage<E>,
        modulus: usize,
        total_transform_length: u64,
    ) -> NttResult<()>;

    /// The transform length this strategy would use for `size` input
    /// elements.
    fn transform_length(&self, size: u64) -> u64;
}
