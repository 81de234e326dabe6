//! In-cache transform using a precomputed root-of-unity table.
//!
//! The forward transform is a Sande-Tukey decimation-in-frequency, the
//! inverse a Cooley-Tukey decimation-in-time; without a permutation
//! table they are each other's exact inverses with the data passing
//! through bit-reversed order in the transform domain.

use mpfloat_storage::{AccessMode, DataStorage};

use crate::element::NttElement;
use crate::error::{NttError, NttResult};
use crate::modmath::ModMath;
use crate::scramble::scramble;
use crate::strategy::NttStrategy;
use crate::builder::round2_up;

/// Forward (Sande-Tukey) fast Number Theoretic Transform, in place.
/// The data length must be a power of two.
pub fn table_fnt<E: NttElement>(
    math: &ModMath<E>,
    data: &mut [E],
    w_table: &[E],
    permutation_table: Option<&[[u32; 2]]>,
) {
    let nn = data.len();
    debug_assert!(nn.is_power_of_two() || nn <= 1);
    if nn < 2 {
        return;
    }

    let mut r = 1usize;
    let mut mmax = nn >> 1;
    while mmax > 0 {
        let istep = mmax << 1;

        // First butterfly of each group has w = 1
        let mut i = 0;
        while i < nn {
            let j = i + mmax;
            let a = data[i];
            let b = data[j];
            data[i] = math.mod_add(a, b);
            data[j] = math.mod_subtract(a, b);
            i += istep;
        }

        let mut t = r;
        for m in 1..mmax {
            let mut i = m;
            while i < nn {
                let j = i + mmax;
                let a = data[i];
                let b = data[j];
                data[i] = math.mod_add(a, b);
                data[j] = math.mod_multiply(w_table[t], math.mod_subtract(a, b));
                i += istep;
            }
            t += r;
        }
        r <<= 1;
        mmax >>= 1;
    }

    if let Some(table) = permutation_table {
        scramble(data, table);
    }
}

/// Inverse (Cooley-Tukey) fast Number Theoretic Transform, in place.
/// The data length must be a power of two. The caller divides through by
/// the transform length afterwards.
pub fn inverse_table_fnt<E: NttElement>(
    math: &ModMath<E>,
    data: &mut [E],
    w_table: &[E],
    permutation_table: Option<&[[u32; 2]]>,
) {
    let nn = data.len();
    debug_assert!(nn.is_power_of_two() || nn <= 1);
    if nn < 2 {
        return;
    }

    if let Some(table) = permutation_table {
        scramble(data, table);
    }

    let mut r = nn;
    let mut mmax = 1usize;
    while nn > mmax {
        let istep = mmax << 1;
        r >>= 1;

        // First butterfly of each group has w = 1
        let mut i = 0;
        while i < nn {
            let j = i + mmax;
            let t = data[j];
            data[j] = math.mod_subtract(data[i], t);
            data[i] = math.mod_add(data[i], t);
            i += istep;
        }

        let mut t = r;
        for m in 1..mmax {
            let mut i = m;
            while i < nn {
                let j = i + mmax;
                let w = math.mod_multiply(w_table[t], data[j]);
                data[j] = math.mod_subtract(data[i], w);
                data[i] = math.mod_add(data[i], w);
                i += istep;
            }
            t += r;
        }
        mmax = istep;
    }
}

/// Multiply every element by `1 / divisor` mod the active prime.
pub fn divide_elements<E: NttElement>(math: &ModMath<E>, data: &mut [E], divisor: u64) {
    let inverse_factor = math.mod_inverse(E::from_u64(divisor % math.modulus().to_u64()));
    for v in data.iter_mut() {
        *v = math.mod_multiply(*v, inverse_factor);
    }
}

pub(crate) fn check_length<E: NttElement>(length: u64) -> NttResult<()> {
    if length > E::MAX_TRANSFORM_LENGTH {
        return Err(NttError::TransformLengthExceeded {
            length,
            max: E::MAX_TRANSFORM_LENGTH,
        });
    }
    if length > i32::MAX as u64 {
        return Err(NttError::ArrayLengthExceeded { length });
    }
    Ok(())
}

/// In-cache transform strategy: the whole array plus its root table fit
/// in L1, so the plain table transform is used directly.
#[derive(Debug, Default)]
pub struct TableFntStrategy;

impl TableFntStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<E: NttElement> NttStrategy<E> for TableFntStrategy {
    fn transform(&self, storage: &DataStorage<E>, modulus: usize) -> NttResult<()> {
        let length = storage.size();
        check_length::<E>(length)?;

        let math = ModMath::<E>::new(modulus);
        let w = math.forward_nth_root(length)?;
        #[allow(clippy::cast_possible_truncation)]
        let length = length as usize;
        let w_table = math.create_w_table(w, length);

        let mut array = storage.array(AccessMode::ReadWrite, 0, length)?;
        table_fnt(&math, &mut array, &w_table, None);
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
        let w = math.inverse_nth_root(length)?;
        #[allow(clippy::cast_possible_truncation)]
        let length = length as usize;
        let w_table = math.create_w_table(w, length);

        let mut array = storage.array(AccessMode::ReadWrite, 0, length)?;
        inverse_table_fnt(&math, &mut array, &w_table, None);
        divide_elements(&math, &mut array, total_transform_length);
        array.close()?;
        Ok(())
    }

    fn transform_length(&self, size: u64) -> u64 {
        round2_up(size)
    }
}
