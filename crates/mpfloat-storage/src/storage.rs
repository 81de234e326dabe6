//! Data storage: a uniform view over a digit array in RAM or on disk.
//!
//! A `DataStorage` is a cheap-to-clone handle; clones and subsequence
//! views share the backing bytes. The memory backend hands out zero-copy
//! array views; the disk backend materializes bounded blocks and writes
//! them back when the view is closed. Iterators buffer disk access in
//! blocks sized from the context, and lock per element on memory so that
//! several iterators over one storage never deadlock.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::context::{register_temp_file, unregister_temp_file, Context};
use crate::element::Element;
use crate::error::{StorageError, StorageResult};

/// Access mode for iterators and array views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    #[inline]
    fn reads(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    #[inline]
    fn writes(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

enum Inner<E: Element> {
    Memory(Mutex<Vec<E>>),
    Disk(DiskFile),
}

#[derive(Debug)]
struct DiskFile {
    path: PathBuf,
    file: Mutex<File>,
    /// Size in elements.
    size: AtomicU64,
    /// Array view budget (max memory block), in elements.
    view_budget: usize,
    /// Iterator buffering granularity (I/O block size), in elements.
    block_elements: usize,
}

impl DiskFile {
    fn io_err(&self, e: std::io::Error) -> StorageError {
        StorageError::io(self.path.clone(), e)
    }

    fn read_block<E: Element>(&self, pos: u64, out: &mut [E]) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos * E::SIZE as u64))
            .map_err(|e| self.io_err(e))?;
        with_io_buffer(out.len() * E::SIZE, |buf| {
            file.read_exact(buf).map_err(|e| self.io_err(e))?;
            for (i, v) in out.iter_mut().enumerate() {
                *v = E::read_le_bytes(&buf[i * E::SIZE..]);
            }
            Ok(())
        })
    }

    fn write_block<E: Element>(&self, pos: u64, data: &[E]) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos * E::SIZE as u64))
            .map_err(|e| self.io_err(e))?;
        with_io_buffer(data.len() * E::SIZE, |buf| {
            for (i, v) in data.iter().enumerate() {
                v.write_le_bytes(&mut buf[i * E::SIZE..]);
            }
            file.write_all(buf).map_err(|e| self.io_err(e))
        })
    }
}

impl Drop for DiskFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to delete temp file {:?}: {e}", self.path);
        }
        unregister_temp_file(&self.path);
    }
}

thread_local! {
    // One I/O staging buffer per thread, grown on demand and reused so
    // block transfers never fall back to tiny default buffers.
    static IO_BUFFER: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

fn with_io_buffer<R>(len: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
    IO_BUFFER.with(|cell| {
        let mut buf = cell.borrow_mut();
        if buf.len() < len {
            buf.resize(len, 0);
        }
        f(&mut buf[..len])
    })
}

/// Owner of (or view into) a digit sequence of known length.
///
/// Clones share the backing bytes. Subsequence views carry their own
/// offset and length and refuse `set_size`.
pub struct DataStorage<E: Element> {
    inner: Arc<Inner<E>>,
    offset: u64,
    len: u64,
    is_view: bool,
    read_only: bool,
}

impl<E: Element> Clone for DataStorage<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            offset: self.offset,
            len: self.len,
            is_view: self.is_view,
            read_only: self.read_only,
        }
    }
}

impl<E: Element> DataStorage<E> {
    /// Create an in-memory storage of `size` zero elements.
    #[must_use]
    pub fn memory(size: u64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let vec = vec![E::ZERO; size as usize];
        Self {
            inner: Arc::new(Inner::Memory(Mutex::new(vec))),
            offset: 0,
            len: size,
            is_view: false,
            read_only: false,
        }
    }

    /// Create a disk-backed storage of `size` zero elements.
    ///
    /// The backing file is obtained from the context's filename generator
    /// and deleted when the storage is dropped (or at shutdown as a
    /// backstop).
    pub fn disk(size: u64) -> StorageResult<Self> {
        let ctx = Context::global();
        let path = ctx.filename_generator.generate();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StorageError::io(path.clone(), e))?;
        file.set_len(size * E::SIZE as u64)
            .map_err(|e| StorageError::io(path.clone(), e))?;
        register_temp_file(path.clone());
        tracing::debug!("created disk storage {:?} ({size} elements)", path);

        Ok(Self {
            inner: Arc::new(Inner::Disk(DiskFile {
                path,
                file: Mutex::new(file),
                size: AtomicU64::new(size),
                view_budget: (ctx.max_memory_block / E::SIZE).max(1),
                block_elements: (ctx.block_size / E::SIZE).max(1),
            })),
            offset: 0,
            len: size,
            is_view: false,
            read_only: false,
        })
    }

    /// Create a storage of `size` elements, picking memory or disk by the
    /// context's memory threshold.
    pub fn create(size: u64) -> StorageResult<Self> {
        let ctx = Context::global();
        let bytes = size * E::SIZE as u64;
        if bytes <= ctx.memory_threshold as u64 {
            Ok(Self::memory(size))
        } else {
            Self::disk(size)
        }
    }

    /// Number of elements visible through this handle.
    #[must_use]
    pub fn size(&self) -> u64 {
        if self.is_view {
            self.len
        } else {
            match &*self.inner {
                Inner::Memory(vec) => vec.lock().len() as u64,
                Inner::Disk(disk) => disk.size.load(Ordering::Acquire),
            }
        }
    }

    /// Resize the storage. New elements at the end are zero; shrinking
    /// discards. Not available on subsequence views.
    pub fn set_size(&self, size: u64) -> StorageResult<()> {
        if self.is_view {
            return Err(StorageError::ResizeSubsequence);
        }
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        match &*self.inner {
            Inner::Memory(vec) => {
                #[allow(clippy::cast_possible_truncation)]
                vec.lock().resize(size as usize, E::ZERO);
            }
            Inner::Disk(disk) => {
                let file = disk.file.lock();
                file.set_len(size * E::SIZE as u64)
                    .map_err(|e| disk.io_err(e))?;
                disk.size.store(size, Ordering::Release);
            }
        }
        Ok(())
    }

    /// Whether views into this storage are O(1) random access (needed by
    /// the parallel carry-CRT).
    #[must_use]
    pub fn is_random_access(&self) -> bool {
        matches!(&*self.inner, Inner::Memory(_))
    }

    /// Whether this handle is a subsequence view.
    #[must_use]
    pub fn is_view(&self) -> bool {
        self.is_view
    }

    /// Mark this handle read-only; write accesses through it will fail.
    #[must_use]
    pub fn into_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// A non-owning view of `[offset, offset + len)` sharing the backing
    /// bytes. The view cannot be resized.
    pub fn subsequence(&self, offset: u64, len: u64) -> StorageResult<Self> {
        let size = self.size();
        if offset + len > size {
            return Err(StorageError::OutOfBounds {
                offset,
                end: offset + len,
                size,
            });
        }
        Ok(Self {
            inner: self.inner.clone(),
            offset: self.offset + offset,
            len,
            is_view: true,
            read_only: self.read_only,
        })
    }

    fn check_range(&self, mode: AccessMode, offset: u64, len: u64) -> StorageResult<()> {
        if mode.writes() && self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let size = self.size();
        if offset + len > size {
            return Err(StorageError::OutOfBounds {
                offset,
                end: offset + len,
                size,
            });
        }
        Ok(())
    }

    /// A contiguous view of `len` elements starting at `offset`.
    ///
    /// Memory storage returns the actual buffer (zero-copy); disk storage
    /// materializes a block bounded by the context block budget and
    /// writes it back on `close`.
    pub fn array(&self, mode: AccessMode, offset: u64, len: usize) -> StorageResult<ArrayAccess<'_, E>> {
        self.check_range(mode, offset, len as u64)?;
        let abs = self.offset + offset;
        match &*self.inner {
            Inner::Memory(vec) => {
                let guard = vec.lock();
                #[allow(clippy::cast_possible_truncation)]
                let mapped = MutexGuard::map(guard, |v| {
                    &mut v[abs as usize..abs as usize + len]
                });
                Ok(ArrayAccess {
                    data: ArrayData::Memory(mapped),
                })
            }
            Inner::Disk(disk) => {
                if len > disk.view_budget {
                    return Err(StorageError::BlockSizeExceeded {
                        requested: len,
                        budget: disk.view_budget,
                    });
                }
                let mut buf = vec![E::ZERO; len];
                if mode.reads() {
                    disk.read_block(abs, &mut buf)?;
                }
                Ok(ArrayAccess {
                    data: ArrayData::Disk {
                        buf,
                        disk,
                        pos: abs,
                        write_back: mode.writes(),
                        closed: false,
                    },
                })
            }
        }
    }

    /// A forward or backward iterator over `[start, end)`.
    ///
    /// `start <= end` iterates positions `start, start+1, …, end-1`;
    /// `start > end` iterates `start-1, start-2, …, end` (used by the
    /// carry pass, which walks from the least significant element up).
    pub fn iterator(&self, mode: AccessMode, start: u64, end: u64) -> StorageResult<StorageIter<'_, E>> {
        let (lo, hi, forward) = if start <= end {
            (start, end, true)
        } else {
            (end, start, false)
        };
        self.check_range(mode, lo, hi - lo)?;

        let block = match &*self.inner {
            Inner::Memory(_) => (Context::global().block_size / E::SIZE).max(1),
            Inner::Disk(disk) => disk.block_elements,
        };

        let mut iter = StorageIter {
            storage: self,
            mode,
            pos: if forward { lo } else { hi.saturating_sub(1) },
            lo,
            left: hi - lo,
            forward,
            buf: Vec::new(),
            buf_start: 0,
            dirty: false,
            block,
        };
        if iter.left > 0 {
            iter.fill_buffer()?;
        }
        Ok(iter)
    }

    /// Stream `len` elements starting at `offset` into a writer as
    /// little-endian bytes, looping with a context-sized block buffer.
    pub fn transfer_to<W: Write>(&self, out: &mut W, offset: u64, len: u64) -> StorageResult<()> {
        self.check_range(AccessMode::Read, offset, len)?;
        let block = self.transfer_block();
        let mut pos = offset;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(block as u64) as usize;
            let view = self.array(AccessMode::Read, pos, n)?;
            with_io_buffer(n * E::SIZE, |buf| {
                for (i, v) in view.iter().enumerate() {
                    v.write_le_bytes(&mut buf[i * E::SIZE..]);
                }
                out.write_all(buf)
                    .map_err(|e| StorageError::io(self.file_name(), e))
            })?;
            view.close()?;
            pos += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Fill `len` elements starting at `offset` from a reader of
    /// little-endian bytes, looping with a context-sized block buffer.
    pub fn transfer_from<R: Read>(&self, input: &mut R, offset: u64, len: u64) -> StorageResult<()> {
        self.check_range(AccessMode::Write, offset, len)?;
        let block = self.transfer_block();
        let mut pos = offset;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(block as u64) as usize;
            let mut view = self.array(AccessMode::Write, pos, n)?;
            with_io_buffer(n * E::SIZE, |buf| {
                input
                    .read_exact(buf)
                    .map_err(|e| StorageError::io(self.file_name(), e))?;
                for (i, v) in view.iter_mut().enumerate() {
                    *v = E::read_le_bytes(&buf[i * E::SIZE..]);
                }
                Ok::<_, StorageError>(())
            })?;
            view.close()?;
            pos += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }

    fn transfer_block(&self) -> usize {
        match &*self.inner {
            Inner::Memory(_) => (Context::global().block_size / E::SIZE).max(1),
            Inner::Disk(disk) => disk.block_elements,
        }
    }

    fn file_name(&self) -> PathBuf {
        match &*self.inner {
            Inner::Memory(_) => PathBuf::from("<memory>"),
            Inner::Disk(disk) => disk.path.clone(),
        }
    }

    /// The backing file path for disk storage, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &*self.inner {
            Inner::Memory(_) => None,
            Inner::Disk(disk) => Some(&disk.path),
        }
    }

    /// Read a single element (bounds-checked).
    pub fn get(&self, index: u64) -> StorageResult<E> {
        self.check_range(AccessMode::Read, index, 1)?;
        let abs = self.offset + index;
        match &*self.inner {
            Inner::Memory(vec) => {
                #[allow(clippy::cast_possible_truncation)]
                Ok(vec.lock()[abs as usize])
            }
            Inner::Disk(disk) => {
                let mut one = [E::ZERO; 1];
                disk.read_block(abs, &mut one)?;
                Ok(one[0])
            }
        }
    }

    /// Write a single element (bounds-checked).
    pub fn set(&self, index: u64, value: E) -> StorageResult<()> {
        self.check_range(AccessMode::Write, index, 1)?;
        let abs = self.offset + index;
        match &*self.inner {
            Inner::Memory(vec) => {
                #[allow(clippy::cast_possible_truncation)]
                {
                    vec.lock()[abs as usize] = value;
                }
                Ok(())
            }
            Inner::Disk(disk) => disk.write_block(abs, &[value]),
        }
    }
}

#[derive(Debug)]
enum ArrayData<'a, E: Element> {
    Memory(MappedMutexGuard<'a, [E]>),
    Disk {
        buf: Vec<E>,
        disk: &'a DiskFile,
        pos: u64,
        write_back: bool,
        closed: bool,
    },
}

/// A contiguous, sliceable view into a storage range.
#[derive(Debug)]
pub struct ArrayAccess<'a, E: Element> {
    data: ArrayData<'a, E>,
}

impl<E: Element> std::ops::Deref for ArrayAccess<'_, E> {
    type Target = [E];

    fn deref(&self) -> &[E] {
        match &self.data {
            ArrayData::Memory(guard) => guard,
            ArrayData::Disk { buf, .. } => buf,
        }
    }
}

impl<E: Element> std::ops::DerefMut for ArrayAccess<'_, E> {
    fn deref_mut(&mut self) -> &mut [E] {
        match &mut self.data {
            ArrayData::Memory(guard) => guard,
            ArrayData::Disk { buf, .. } => buf,
        }
    }
}

impl<E: Element> ArrayAccess<'_, E> {
    /// Flush the view back to its storage. Memory views are zero-copy and
    /// need no flush; disk views write their block back.
    pub fn close(mut self) -> StorageResult<()> {
        self.flush()
    }

    fn flush(&mut self) -> StorageResult<()> {
        if let ArrayData::Disk {
            buf,
            disk,
            pos,
            write_back,
            closed,
        } = &mut self.data
        {
            if *write_back && !*closed {
                disk.write_block(*pos, buf)?;
            }
            *closed = true;
        }
        Ok(())
    }
}

impl<E: Element> Drop for ArrayAccess<'_, E> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("array access write-back failed on drop: {e}");
        }
    }
}

/// A forward/backward element iterator with `get`/`set`/`next` semantics.
///
/// Disk storage is buffered in blocks; memory storage is accessed with a
/// short per-block lock so that several iterators over one storage can
/// interleave without deadlocking.
pub struct StorageIter<'a, E: Element> {
    storage: &'a DataStorage<E>,
    mode: AccessMode,
    /// Current position within the view (valid while `left > 0`).
    pos: u64,
    lo: u64,
    /// Elements left to visit, including the current one.
    left: u64,
    forward: bool,
    buf: Vec<E>,
    buf_start: u64,
    dirty: bool,
    block: usize,
}

impl<E: Element> StorageIter<'_, E> {
    /// Elements left to visit, including the current one.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.left
    }

    /// Whether a current element exists.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.left > 0
    }

    fn fill_buffer(&mut self) -> StorageResult<()> {
        self.flush_buffer()?;
        let start = if self.forward {
            self.pos
        } else {
            (self.pos + 1).saturating_sub(self.block as u64).max(self.lo)
        };
        let len = if self.forward {
            self.left.min(self.block as u64)
        } else {
            self.pos + 1 - start
        };
        #[allow(clippy::cast_possible_truncation)]
        let len = len as usize;
        self.buf.resize(len, E::ZERO);
        self.buf_start = start;

        let abs = self.storage.offset + start;
        match &*self.storage.inner {
            Inner::Memory(vec) => {
                if self.mode.reads() {
                    let guard = vec.lock();
                    #[allow(clippy::cast_possible_truncation)]
                    self.buf
                        .copy_from_slice(&guard[abs as usize..abs as usize + len]);
                } else {
                    self.buf.fill(E::ZERO);
                }
            }
            Inner::Disk(disk) => {
                if self.mode.reads() {
                    disk.read_block(abs, &mut self.buf)?;
                } else {
                    self.buf.fill(E::ZERO);
                }
            }
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> StorageResult<()> {
        if !self.dirty || self.buf.is_empty() {
            self.dirty = false;
            return Ok(());
        }
        let abs = self.storage.offset + self.buf_start;
        match &*self.storage.inner {
            Inner::Memory(vec) => {
                let mut guard = vec.lock();
                #[allow(clippy::cast_possible_truncation)]
                guard[abs as usize..abs as usize + self.buf.len()].copy_from_slice(&self.buf);
            }
            Inner::Disk(disk) => disk.write_block(abs, &self.buf)?,
        }
        self.dirty = false;
        Ok(())
    }

    #[inline]
    fn buf_index(&self) -> usize {
        debug_assert!(self.pos >= self.buf_start);
        #[allow(clippy::cast_possible_truncation)]
        {
            (self.pos - self.buf_start) as usize
        }
    }

    /// The element at the current position.
    #[must_use]
    pub fn get(&self) -> E {
        debug_assert!(self.has_next(), "iterator read past its range");
        debug_assert!(self.mode.reads());
        self.buf[self.buf_index()]
    }

    /// Overwrite the element at the current position.
    pub fn set(&mut self, value: E) {
        debug_assert!(self.has_next(), "iterator write past its range");
        debug_assert!(self.mode.writes());
        let i = self.buf_index();
        self.buf[i] = value;
        self.dirty = true;
    }

    /// Advance to the next element in iteration order.
    pub fn next(&mut self) -> StorageResult<()> {
        if self.left == 0 {
            return Ok(());
        }
        self.left -= 1;
        if self.left == 0 {
            // Exhausted; do not move past the range bounds.
            return self.flush_buffer();
        }
        if self.forward {
            self.pos += 1;
            if self.pos >= self.buf_start + self.buf.len() as u64 {
                self.fill_buffer()?;
            }
        } else {
            self.pos -= 1;
            if self.pos < self.buf_start {
                self.fill_buffer()?;
            }
        }
        Ok(())
    }

    /// Flush pending writes and finish the iteration.
    pub fn close(mut self) -> StorageResult<()> {
        self.flush_buffer()
    }
}

impl<E: Element> Drop for StorageIter<'_, E> {
    fn drop(&mut self) {
        if let Err(e) = self.flush_buffer() {
            tracing::warn!("iterator write-back failed on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sequence(storage: &DataStorage<u32>, n: u64) {
        let mut it = storage.iterator(AccessMode::Write, 0, n).unwrap();
        for i in 0..n {
            #[allow(clippy::cast_possible_truncation)]
            it.set(i as u32 + 1);
            it.next().unwrap();
        }
        it.close().unwrap();
    }

    #[test]
    fn memory_roundtrip() {
        let storage = DataStorage::<u32>::memory(16);
        write_sequence(&storage, 16);
        let view = storage.array(AccessMode::Read, 0, 16).unwrap();
        let expected: Vec<u32> = (1..=16).collect();
        assert_eq!(&view[..], &expected[..]);
    }

    #[test]
    fn set_size_pads_with_zeros() {
        let storage = DataStorage::<u32>::memory(4);
        write_sequence(&storage, 4);
        storage.set_size(8).unwrap();
        assert_eq!(storage.size(), 8);
        let view = storage.array(AccessMode::Read, 0, 8).unwrap();
        assert_eq!(&view[..], &[1, 2, 3, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn subsequence_shares_backing() {
        let storage = DataStorage::<u32>::memory(8);
        write_sequence(&storage, 8);
        let sub = storage.subsequence(2, 4).unwrap();
        assert_eq!(sub.size(), 4);
        assert_eq!(sub.get(0).unwrap(), 3);
        sub.set(0, 99).unwrap();
        assert_eq!(storage.get(2).unwrap(), 99);
        assert!(sub.set_size(10).is_err());
    }

    #[test]
    fn reverse_iteration() {
        let storage = DataStorage::<u32>::memory(5);
        write_sequence(&storage, 5);
        let mut it = storage.iterator(AccessMode::Read, 5, 0).unwrap();
        let mut seen = Vec::new();
        while it.has_next() {
            seen.push(it.get());
            it.next().unwrap();
        }
        assert_eq!(seen, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn two_iterators_same_storage() {
        // A read and a write iterator on one storage must interleave
        // without deadlocking.
        let storage = DataStorage::<u32>::memory(4);
        write_sequence(&storage, 4);
        let src = storage.subsequence(0, 2).unwrap();
        let dst = storage.subsequence(2, 2).unwrap();
        let mut rd = src.iterator(AccessMode::Read, 0, 2).unwrap();
        let mut wr = dst.iterator(AccessMode::Write, 0, 2).unwrap();
        while rd.has_next() {
            wr.set(rd.get() * 10);
            rd.next().unwrap();
            wr.next().unwrap();
        }
        drop(rd);
        wr.close().unwrap();
        let view = storage.array(AccessMode::Read, 0, 4).unwrap();
        assert_eq!(&view[..], &[1, 2, 10, 20]);
    }

    #[test]
    fn disk_roundtrip() {
        let storage = DataStorage::<u32>::disk(64).unwrap();
        write_sequence(&storage, 64);
        let path = storage.path().unwrap().to_path_buf();
        assert!(path.exists());

        let mut it = storage.iterator(AccessMode::Read, 0, 64).unwrap();
        for i in 0..64u32 {
            assert_eq!(it.get(), i + 1);
            it.next().unwrap();
        }
        drop(it);

        // Array view write-back.
        let mut view = storage.array(AccessMode::ReadWrite, 10, 4).unwrap();
        view[0] = 1000;
        view.close().unwrap();
        assert_eq!(storage.get(10).unwrap(), 1000);

        drop(storage);
        assert!(!path.exists(), "temp file must be deleted on drop");
    }

    #[test]
    fn disk_view_budget_enforced() {
        let _ = Context::install(Context::new().with_max_memory_block(64 * 8));
        let storage = DataStorage::<u64>::disk(1024).unwrap();
        let err = storage.array(AccessMode::Read, 0, 1024).unwrap_err();
        assert!(matches!(err, StorageError::BlockSizeExceeded { .. }));
        let _ = Context::install(Context::new());
    }

    #[test]
    fn transfer_roundtrip() {
        let src = DataStorage::<u32>::memory(32);
        write_sequence(&src, 32);
        let mut bytes = Vec::new();
        src.transfer_to(&mut bytes, 0, 32).unwrap();
        assert_eq!(bytes.len(), 32 * 4);

        let dst = DataStorage::<u32>::memory(32);
        dst.transfer_from(&mut bytes.as_slice(), 0, 32).unwrap();
        for i in 0..32 {
            assert_eq!(dst.get(i).unwrap(), src.get(i).unwrap());
        }
    }

    #[test]
    fn out_of_bounds_reported() {
        let storage = DataStorage::<u32>::memory(4);
        let err = storage.array(AccessMode::Read, 2, 4).unwrap_err();
        assert!(matches!(err, StorageError::OutOfBounds { .. }));
    }
}
