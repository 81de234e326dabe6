//! Two-pass transform: out of RAM.
//!
//! Same `n1 × n2` decomposition as the six-step transform, but the
//! matrix stays in storage (normally on disk) and only bands of it are
//! resident at a time. The first-dimension transforms stream bands of
//! columns through memory with the inter-stage twiddle multiplication
//! folded into the store (forward) or load (inverse) side, so the data
//! makes exactly two passes over the backing file per transform.
//!
//! The transform-domain digit order is the matrix-transposed order; the
//! inverse consumes exactly what the forward produces, which is all the
//! convolution pipeline needs.

use mpfloat_storage::{AccessMode, Context, DataStorage};

use crate::builder::round2_up;
use crate::element::NttElement;
use crate::error::{NttError, NttResult};
use crate::modmath::ModMath;
use crate::scramble::create_scramble_table;
use crate::six_step::split_length;
use crate::strategy::NttStrategy;
use crate::table_fnt::table_fnt;

/// Two-pass disk transform strategy.
#[derive(Debug)]
pub struct TwoPassFntStrategy {
    max_block_bytes: usize,
}

impl TwoPassFntStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_block_bytes: Context::global().max_memory_block,
        }
    }

    fn budget_elements<E: NttElement>(&self) -> usize {
        (self.max_block_bytes / E::SIZE).max(1)
    }
}

impl Default for TwoPassFntStrategy {
    fn default() -> Self {
        Self::new()
    }
}

struct TwoPass<'a, E: NttElement> {
    math: ModMath<E>,
    storage: &'a DataStorage<E>,
    n1: usize,
    n2: usize,
    /// Root of the full-length transform (forward or inverse).
    w: E,
    /// Extra factor folded into the column-pass twiddles (`1/n` on the
    /// inverse side, one otherwise).
    scale: E,
    budget: usize,
}

impl<E: NttElement> TwoPass<'_, E> {
    /// Transform the columns (the strided first dimension), streaming a
    /// band of columns at a time. `twiddle_on_load` selects whether the
    /// `w^{k·j}·scale` factors are applied before (inverse) or after
    /// (forward) the column transforms.
    fn column_pass(&self, twiddle_on_load: bool) -> NttResult<()> {
        let (n1, n2) = (self.n1, self.n2);
        let w1 = self.math.mod_pow(self.w, n2 as u64);
        let table = self.math.create_w_table(w1, n1);
        let perm = create_scramble_table(n1);

        let band = (self.budget / n1).clamp(1, n2);
        let mut buf = vec![E::ZERO; band * n1];

        let mut j0 = 0usize;
        while j0 < n2 {
            let cols = band.min(n2 - j0);

            // Gather: column j becomes the contiguous slice buf[c·n1..].
            for t1 in 0..n1 {
                let row = self
                    .storage
                    .array(AccessMode::Read, (t1 * n2 + j0) as u64, cols)?;
                for c in 0..cols {
                    buf[c * n1 + t1] = row[c];
                }
            }

            for c in 0..cols {
                let column = &mut buf[c * n1..(c + 1) * n1];
                if twiddle_on_load {
                    self.twiddle_column(column, j0 + c);
                    table_fnt(&self.math, column, &table, Some(&perm));
                } else {
                    table_fnt(&self.math, column, &table, Some(&perm));
                    self.twiddle_column(column, j0 + c);
                }
            }

            // Scatter the band back.
            for t1 in 0..n1 {
                let mut row = self
                    .storage
                    .array(AccessMode::Write, (t1 * n2 + j0) as u64, cols)?;
                for c in 0..cols {
                    row[c] = buf[c * n1 + t1];
                }
                row.close()?;
            }

            j0 += cols;
        }
        Ok(())
    }

    /// Multiply `column[k]` by `w^{k·j} · scale`.
    fn twiddle_column(&self, column: &mut [E], j: usize) {
        let wj = self.math.mod_pow(self.w, j as u64);
        let mut factor = self.scale;
        for v in column.iter_mut() {
            *v = self.math.mod_multiply(*v, factor);
            factor = self.math.mod_multiply(factor, wj);
        }
    }

    /// Transform the rows (the contiguous second dimension), streaming a
    /// band of rows at a time.
    fn row_pass(&self) -> NttResult<()> {
        let (n1, n2) = (self.n1, self.n2);
        if self.budget < n2 {
            return Err(NttError::ArrayLengthExceeded { length: n2 as u64 });
        }
        let w2 = self.math.mod_pow(self.w, n1 as u64);
        let table = self.math.create_w_table(w2, n2);
        let perm = create_scramble_table(n2);

        let band = (self.budget / n2).clamp(1, n1);
        let mut i0 = 0usize;
        while i0 < n1 {
            let rows = band.min(n1 - i0);
            let mut view = self
                .storage
                .array(AccessMode::ReadWrite, (i0 * n2) as u64, rows * n2)?;
            for row in view.chunks_mut(n2) {
                table_fnt(&self.math, row, &table, Some(&perm));
            }
            view.close()?;
            i0 += rows;
        }
        Ok(())
    }
}

fn check_two_pass_length<E: NttElement>(length: u64) -> NttResult<()> {
    if length > E::MAX_TRANSFORM_LENGTH {
        return Err(NttError::TransformLengthExceeded {
            length,
            max: E::MAX_TRANSFORM_LENGTH,
        });
    }
    Ok(())
}

impl<E: NttElement> NttStrategy<E> for TwoPassFntStrategy {
    fn transform(&self, storage: &DataStorage<E>, modulus: usize) -> NttResult<()> {
        let length = storage.size();
        check_two_pass_length::<E>(length)?;
        if length < 2 {
            return Ok(());
        }

        let math = ModMath::<E>::new(modulus);
        #[allow(clippy::cast_possible_truncation)]
        let (n1, n2) = split_length(length as usize);
        let pass = TwoPass {
            math,
            storage,
            n1,
            n2,
            w: math.forward_nth_root(length)?,
            scale: E::ONE,
            budget: self.budget_elements::<E>(),
        };

        // Forward: strided dimension first, twiddles folded into the store.
        pass.column_pass(false)?;
        pass.row_pass()
    }

    fn inverse_transform(
        &self,
        storage: &DataStorage<E>,
        modulus: usize,
        total_transform_length: u64,
    ) -> NttResult<()> {
        let length = storage.size();
        check_two_pass_length::<E>(length.max(total_transform_length))?;
        if length < 2 {
            return Ok(());
        }

        let math = ModMath::<E>::new(modulus);
        #[allow(clippy::cast_possible_truncation)]
        let (n1, n2) = split_length(length as usize);
        let pass = TwoPass {
            math,
            storage,
            n1,
            n2,
            w: math.inverse_nth_root(length)?,
            scale: math
                .mod_inverse(E::from_u64(total_transform_length % math.modulus().to_u64())),
            budget: self.budget_elements::<E>(),
        };

        // Inverse mirrors the forward: rows first, twiddles on the load.
        pass.row_pass()?;
        pass.column_pass(true)
    }

    fn transform_length(&self, size: u64) -> u64 {
        round2_up(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(storage: &DataStorage<u32>, n: u64) -> Vec<u32> {
        let mut original = Vec::new();
        for i in 0..n {
            #[allow(clippy::cast_possible_truncation)]
            let v = (i as u32).wrapping_mul(48271) % 1_000_003;
            storage.set(i, v).unwrap();
            original.push(v);
        }
        original
    }

    fn read_all(storage: &DataStorage<u32>, n: u64) -> Vec<u32> {
        (0..n).map(|i| storage.get(i).unwrap()).collect()
    }

    #[test]
    fn roundtrip_in_memory() {
        for n in [4u64, 64, 256, 2048] {
            let storage = DataStorage::<u32>::memory(n);
            let original = fill(&storage, n);
            let strategy = TwoPassFntStrategy::new();
            NttStrategy::<u32>::transform(&strategy, &storage, 0).unwrap();
            NttStrategy::<u32>::inverse_transform(&strategy, &storage, 0, n).unwrap();
            assert_eq!(read_all(&storage, n), original, "n={n}");
        }
    }

    #[test]
    fn roundtrip_on_disk_with_small_bands() {
        let n = 256u64;
        let storage = DataStorage::<u32>::disk(n).unwrap();
        let original = fill(&storage, n);
        // Force multi-band streaming: room for only a few rows at a time.
        let strategy = TwoPassFntStrategy {
            max_block_bytes: 64 * 4,
        };
        NttStrategy::<u32>::transform(&strategy, &storage, 1).unwrap();
        assert_ne!(read_all(&storage, n), original);
        NttStrategy::<u32>::inverse_transform(&strategy, &storage, 1, n).unwrap();
        assert_eq!(read_all(&storage, n), original);
    }

    #[test]
    fn row_longer_than_budget_is_rejected() {
        let n = 1024u64;
        let storage = DataStorage::<u32>::memory(n);
        fill(&storage, n);
        let strategy = TwoPassFntStrategy {
            max_block_bytes: 8 * 4,
        };
        let err = NttStrategy::<u32>::transform(&strategy, &storage, 0).unwrap_err();
        assert!(matches!(err, NttError::ArrayLengthExceeded { .. }));
    }
}
