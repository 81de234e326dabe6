//! Process-wide configuration context.
//!
//! Mirrors the role of an application-level settings object: every
//! tunable the storage and transform layers consult lives here. Values
//! are read once at strategy-creation time; installing a new context
//! afterwards does not affect strategies already built.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Generator of unique temporary file names for disk-backed storage.
#[derive(Debug)]
pub struct FilenameGenerator {
    directory: PathBuf,
    prefix: String,
    counter: AtomicU64,
}

impl FilenameGenerator {
    /// Create a generator writing into `directory` with the given prefix.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Produce the next unique filename.
    pub fn generate(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}-{}.dat", self.prefix, std::process::id(), n);
        self.directory.join(name)
    }

    /// The directory temp files are created in.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Default for FilenameGenerator {
    fn default() -> Self {
        Self::new(std::env::temp_dir(), "mpfloat")
    }
}

/// Configuration consulted by storage builders and transform strategies.
#[derive(Debug)]
pub struct Context {
    /// Default radix for values that do not specify one.
    pub default_radix: u32,
    /// L1 data cache size in bytes; bounds the in-cache transform.
    pub cache_l1_size: usize,
    /// Largest contiguous memory block a transform may allocate, in bytes.
    pub max_memory_block: usize,
    /// Disk I/O block size in bytes.
    pub block_size: usize,
    /// Worker thread count for the parallel runner.
    pub num_processors: usize,
    /// Storage sizes above this many bytes go to disk.
    pub memory_threshold: usize,
    /// Temp-file name generator for disk storage.
    pub filename_generator: FilenameGenerator,
}

impl Context {
    /// Build a context with defaults derived from the running system.
    #[must_use]
    pub fn new() -> Self {
        let num_processors = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);

        // A quarter of available RAM is the largest single transform
        // buffer we will hold in memory; anything larger streams from disk.
        let available = sysinfo::System::new_all().available_memory() as usize;
        let max_memory_block = (available / 4).clamp(1 << 24, 1 << 36);

        Self {
            default_radix: 10,
            cache_l1_size: 1 << 16,
            max_memory_block,
            block_size: 1 << 16,
            num_processors,
            memory_threshold: 1 << 26,
            filename_generator: FilenameGenerator::default(),
        }
    }

    /// Replace the default radix.
    #[must_use]
    pub fn with_radix(mut self, radix: u32) -> Self {
        self.default_radix = radix;
        self
    }

    /// Replace the L1 cache budget.
    #[must_use]
    pub fn with_cache_l1_size(mut self, bytes: usize) -> Self {
        self.cache_l1_size = bytes;
        self
    }

    /// Replace the maximum in-memory block size.
    #[must_use]
    pub fn with_max_memory_block(mut self, bytes: usize) -> Self {
        self.max_memory_block = bytes;
        self
    }

    /// Replace the disk I/O block size.
    #[must_use]
    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Replace the worker thread count.
    #[must_use]
    pub fn with_num_processors(mut self, n: usize) -> Self {
        self.num_processors = n.max(1);
        self
    }

    /// Replace the disk spill threshold.
    #[must_use]
    pub fn with_memory_threshold(mut self, bytes: usize) -> Self {
        self.memory_threshold = bytes;
        self
    }

    /// The currently installed process-wide context.
    #[must_use]
    pub fn global() -> Arc<Context> {
        if let Some(ctx) = GLOBAL.read().as_ref() {
            return ctx.clone();
        }
        GLOBAL
            .write()
            .get_or_insert_with(|| Arc::new(Context::new()))
            .clone()
    }

    /// Install a new process-wide context. Returns the previous one.
    pub fn install(ctx: Context) -> Arc<Context> {
        let mut guard = GLOBAL.write();
        let old = guard
            .get_or_insert_with(|| Arc::new(Context::new()))
            .clone();
        *guard = Some(Arc::new(ctx));
        old
    }

    /// Delete any temporary files still registered.
    ///
    /// Dropping a disk storage deletes its file; this is the backstop for
    /// files that survived (e.g. leaked handles at process end).
    pub fn shutdown() {
        let mut registry = TEMP_REGISTRY.lock();
        for path in registry.drain(..) {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!("failed to remove temp file {:?}: {e}", path);
                }
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: RwLock<Option<Arc<Context>>> = RwLock::new(None);

/// Files created by disk storages, removed on drop or at shutdown.
static TEMP_REGISTRY: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

pub(crate) fn register_temp_file(path: PathBuf) {
    TEMP_REGISTRY.lock().push(path);
}

pub(crate) fn unregister_temp_file(path: &Path) {
    let mut registry = TEMP_REGISTRY.lock();
    registry.retain(|p| p != path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_generator_unique() {
        let gen = FilenameGenerator::default();
        let a = gen.generate();
        let b = gen.generate();
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("mpfloat"));
    }

    #[test]
    fn context_defaults() {
        let ctx = Context::new();
        assert_eq!(ctx.default_radix, 10);
        assert!(ctx.num_processors >= 1);
        assert!(ctx.max_memory_block >= 1 << 24);
    }

    #[test]
    fn builder_overrides() {
        let ctx = Context::new()
            .with_radix(16)
            .with_block_size(4096)
            .with_num_processors(2);
        assert_eq!(ctx.default_radix, 16);
        assert_eq!(ctx.block_size, 4096);
        assert_eq!(ctx.num_processors, 2);
    }
}
