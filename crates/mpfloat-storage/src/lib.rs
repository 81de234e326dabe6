//! # mpfloat-storage
//!
//! Storage layer for the mpfloat arbitrary-precision arithmetic engine.
//! Provides a uniform view over digit arrays that may live in RAM or in a
//! temporary file on disk, plus the process-wide configuration context
//! that decides which backing to use.

pub mod context;
pub mod element;
pub mod error;
pub mod storage;

// Re-exports
pub use context::{Context, FilenameGenerator};
pub use element::Element;
pub use error::{StorageError, StorageResult};
pub use storage::{AccessMode, ArrayAccess, DataStorage, StorageIter};
