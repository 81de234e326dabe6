//! Per-radix constant caches.
//!
//! Computed constants (π, log of the radix, the binary-splitting state)
//! are cached per radix behind one mutex per radix: concurrent callers
//! for the same radix serialize, other radixes proceed unblocked.
//! Entries are monotone: a cached value is reused when its precision
//! covers the request and extended otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A per-radix cache of one value type.
pub struct RadixCache<T> {
    entries: Mutex<HashMap<u32, Arc<Mutex<Option<T>>>>>,
}

impl<T> RadixCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The entry mutex for `radix`. Holding the returned lock serializes
    /// computation for that radix only.
    pub fn entry(&self, radix: u32) -> Arc<Mutex<Option<T>>> {
        self.entries
            .lock()
            .entry(radix)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Drop every cached value. In-flight computations finish against
    /// their own entry arcs and are re-computed on next use.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<T> Default for RadixCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop all cached per-radix constants and delete leftover temp files.
pub fn shutdown() {
    crate::pi::clear_cache();
    crate::elementary::clear_caches();
    mpfloat_storage::Context::shutdown();
}
