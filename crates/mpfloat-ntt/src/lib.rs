//! # mpfloat-ntt
//!
//! Number Theoretic Transform convolution pipeline for the mpfloat
//! arbitrary-precision arithmetic engine.
//!
//! Multiplication of two digit sequences runs three independent NTTs
//! under distinct primes of the form `k·2^m + 1`, pointwise-multiplies in
//! the transform domain, inverse-transforms, and recombines the residues
//! with a carry-propagating Chinese Remainder pass. Transform strategies
//! cover three size regimes: in-cache lookup-table transforms, in-memory
//! six-step transforms, and disk-backed two-pass transforms, optionally
//! extended to lengths `3·2^k` by a 3-point wrapper.

pub mod builder;
pub mod carry_crt;
pub mod convolution;
pub mod element;
pub mod error;
pub mod factor3;
pub mod modmath;
pub mod parallel;
pub mod scramble;
pub mod six_step;
pub mod strategy;
pub mod table_fnt;
pub mod two_pass;

pub(crate) mod matrix;

// Re-exports
pub use builder::NttBuilder;
pub use carry_crt::CarryCrt;
pub use convolution::multiply;
pub use element::{base_for_radix, NttElement};
pub use error::{NttError, NttResult};
pub use modmath::ModMath;
pub use strategy::NttStrategy;
