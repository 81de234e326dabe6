//! # mpfloat
//!
//! Arbitrary-precision floating-point arithmetic built on a three-modulus
//! NTT convolution engine. Values carry an explicit radix, precision and
//! scale; multiplication routes through `mpfloat-ntt`, and the
//! non-elementary operations (roots, logarithm, exponential, π) are
//! built with precision-doubling Newton iterations on top of it.

pub mod caches;
pub mod elementary;
pub mod error;
pub mod newton;
pub mod pi;
pub mod value;

pub(crate) mod arith;
pub(crate) mod format;

// Re-exports
pub use elementary::{agm, exp, log, log_base, log_radix};
pub use error::{ApfloatError, ApfloatResult};
pub use newton::{cbrt, divide, inverse_root, pow, root, sqrt};
pub use pi::pi;
pub use value::{Apfloat, Digit, INFINITE};
