//! Six-step transform: out of cache, in RAM.
//!
//! The length-`n` array is reshaped into an `n1 × n2` matrix with both
//! factors near `√n`, so each row transform is small enough to stay in
//! cache. Natural-order row transforms (permutation tables applied) keep
//! the inter-stage twiddle exponents plain `i·j` products. The row and
//! twiddle passes parallelize across bands of rows; the `1/n` scaling of
//! the inverse folds into its twiddle pass.

use mpfloat_storage::{AccessMode, Context, DataStorage};

use crate::builder::round2_up;
use crate::element::NttElement;
use crate::error::NttResult;
use crate::matrix::transpose;
use crate::modmath::ModMath;
use crate::parallel::split_rows;
use crate::scramble::create_scramble_table;
use crate::strategy::NttStrategy;
use crate::table_fnt::{check_length, table_fnt};

/// Six-step in-memory transform strategy.
#[derive(Debug)]
pub struct SixStepFntStrategy {
    num_processors: usize,
}

impl SixStepFntStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            num_processors: Context::global().num_processors,
        }
    }
}

impl Default for SixStepFntStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a power-of-two length into `n1 × n2` with `n1 ≤ n2 ≤ 2·n1`.
pub(crate) fn split_length(n: usize) -> (usize, usize) {
    debug_assert!(n.is_power_of_two());
    let log = n.trailing_zeros();
    let n1 = 1usize << (log / 2);
    (n1, n / n1)
}

/// Run the six-step transform in place over `data`.
///
/// A transform with an inverse root computes the unscaled inverse; the
/// `1/scale_divisor` factor (the total transform length) is folded into
/// the twiddle pass.
pub(crate) fn six_step<E: NttElement>(
    math: &ModMath<E>,
    data: &mut [E],
    inverse: bool,
    scale_divisor: u64,
    threads: usize,
) -> NttResult<()> {
    let n = data.len() as u64;
    if n < 2 {
        return Ok(());
    }
    let w = if inverse {
        math.inverse_nth_root(n)?
    } else {
        math.forward_nth_root(n)?
    };

    #[allow(clippy::cast_possible_truncation)]
    let (n1, n2) = split_length(n as usize);

    let w1 = math.mod_pow(w, n2 as u64); // order-n1 root for the first row pass
    let w2 = math.mod_pow(w, n1 as u64); // order-n2 root for the second
    let table1 = math.create_w_table(w1, n1);
    let table2 = math.create_w_table(w2, n2);
    let perm1 = create_scramble_table(n1);
    let perm2 = create_scramble_table(n2);

    let scale = if inverse {
        math.mod_inverse(E::from_u64(scale_divisor % math.modulus().to_u64()))
    } else {
        E::ONE
    };

    // 1: transpose so the first-dimension transforms are contiguous rows.
    transpose(data, n1, n2);

    // 2: transform the n2 rows of length n1.
    split_rows(data, n1, threads, |_, band| {
        for row in band.chunks_mut(n1) {
            table_fnt(math, row, &table1, Some(&perm1));
        }
    });

    // 3: multiply element (i, j) by w^{i·j} (and the inverse scale).
    split_rows(data, n1, threads, |first_row, band| {
        for (r, row) in band.chunks_mut(n1).enumerate() {
            let wi = math.mod_pow(w, (first_row + r) as u64);
            let mut factor = scale;
            for v in row.iter_mut() {
                *v = math.mod_multiply(*v, factor);
                factor = math.mod_multiply(factor, wi);
            }
        }
    });

    // 4: transpose back.
    transpose(data, n2, n1);

    // 5: transform the n1 rows of length n2.
    split_rows(data, n2, threads, |_, band| {
        for row in band.chunks_mut(n2) {
            table_fnt(math, row, &table2, Some(&perm2));
        }
    });

    // 6: final transpose into natural frequency order.
    transpose(data, n1, n2);

    Ok(())
}

impl<E: NttElement> NttStrategy<E> for SixStepFntStrategy {
    fn transform(&self, storage: &DataStorage<E>, modulus: usize) -> NttResult<()> {
        let length = storage.size();
        check_length::<E>(length)?;

        let math = ModMath::<E>::new(modulus);
        #[allow(clippy::cast_possible_truncation)]
        let mut array = storage.array(AccessMode::ReadWrite, 0, length as usize)?;
        six_step(&math, &mut array, false, length, self.num_processors)?;
        array.close()?;
        Ok(())
    }

    fn inverse_transform(
        &self,
        storage: &DataStorage<E>,
        modulus: usize,
        total_transform_length: u64,
    ) -> NttResult<()> {
        let length = storage.size();
        check_length::<E>(length.max(total_transform_length))?;

        let math = ModMath::<E>::new(modulus);
        #[allow(clippy::cast_possible_truncation)]
        let mut array = storage.array(AccessMode::ReadWrite, 0, length as usize)?;
        six_step(&math, &mut array, true, total_transform_length, self.num_processors)?;
        array.close()?;
        Ok(())
    }

    fn transform_length(&self, size: u64) -> u64 {
        round2_up(size)
    }
}
