//! Factor-3 wrapper: extends a power-of-two transform to lengths `3·2^k`.
//!
//! The storage splits into three contiguous sub-arrays of length `2^k`.
//! A 3-point Winograd transform runs "column-wise" across the three
//! sub-arrays element by element with running twiddles, and the
//! underlying strategy transforms each sub-array. The inverse reverses
//! the order.

use mpfloat_storage::{AccessMode, DataStorage};

use crate::builder::round23_up;
use crate::element::NttElement;
use crate::error::{NttError, NttResult};
use crate::modmath::ModMath;
use crate::six_step::{six_step, SixStepFntStrategy};
use crate::strategy::NttStrategy;

/// The 3-point WFTA butterfly with three multiplications.
/// `w1 = −3/2` and `w2 = w3 + 1/2` modulo the active prime.
#[inline]
#[allow(clippy::too_many_arguments)]
fn dft3<E: NttElement>(
    math: &ModMath<E>,
    mut x0: E,
    mut x1: E,
    mut x2: E,
    w1: E,
    w2: E,
    tmp1: E,
    tmp2: E,
    inverse: bool,
) -> (E, E, E) {
    if inverse {
        // Twiddle before the transform
        x1 = math.mod_multiply(x1, tmp1);
        x2 = math.mod_multiply(x2, tmp2);
    }

    let mut t = math.mod_add(x1, x2);
    x2 = math.mod_subtract(x1, x2);
    x0 = math.mod_add(x0, t);
    t = math.mod_multiply(t, w1);
    x2 = math.mod_multiply(x2, w2);
    t = math.mod_add(t, x0);
    x1 = math.mod_add(t, x2);
    x2 = math.mod_subtract(t, x2);

    if !inverse {
        // Twiddle after the transform
        x1 = math.mod_multiply(x1, tmp1);
        x2 = math.mod_multiply(x2, tmp2);
    }

    (x0, x1, x2)
}

struct ColumnWeights<E> {
    w: E,
    ww: E,
    w1: E,
    w2: E,
}

fn column_weights<E: NttElement>(math: &ModMath<E>, w: E, w3: E) -> ColumnWeights<E> {
    ColumnWeights {
        w,
        ww: math.mod_multiply(w, w),
        w1: math.negate(math.mod_divide(E::from_u64(3), E::from_u64(2))),
        w2: math.mod_add(w3, math.mod_divide(E::ONE, E::from_u64(2))),
    }
}

/// Run the 3-point transform across three equal subsequences through
/// storage iterators.
fn transform_columns<E: NttElement>(
    math: &ModMath<E>,
    inverse: bool,
    s0: &DataStorage<E>,
    s1: &DataStorage<E>,
    s2: &DataStorage<E>,
    size: u64,
    weights: &ColumnWeights<E>,
) -> NttResult<()> {
    let mut it0 = s0.iterator(AccessMode::ReadWrite, 0, size)?;
    let mut it1 = s1.iterator(AccessMode::ReadWrite, 0, size)?;
    let mut it2 = s2.iterator(AccessMode::ReadWrite, 0, size)?;

    let mut tmp1 = E::ONE;
    let mut tmp2 = E::ONE;
    for _ in 0..size {
        let (x0, x1, x2) = dft3(
            math,
            it0.get(),
            it1.get(),
            it2.get(),
            weights.w1,
            weights.w2,
            tmp1,
            tmp2,
            inverse,
        );
        it0.set(x0);
        it1.set(x1);
        it2.set(x2);
        it0.next()?;
        it1.next()?;
        it2.next()?;

        tmp1 = math.mod_multiply(tmp1, weights.w);
        tmp2 = math.mod_multiply(tmp2, weights.ww);
    }
    it0.close()?;
    it1.close()?;
    it2.close()?;
    Ok(())
}

fn check_length<E: NttElement>(length: u64) -> NttResult<()> {
    if length > E::MAX_TRANSFORM_LENGTH {
        return Err(NttError::TransformLengthExceeded {
            length,
            max: E::MAX_TRANSFORM_LENGTH,
        });
    }
    Ok(())
}

/// Generic factor-3 wrapper around any power-of-two strategy.
pub struct Factor3NttStrategy<E: NttElement> {
    factor2: Box<dyn NttStrategy<E>>,
}

impl<E: NttElement> Factor3NttStrategy<E> {
    #[must_use]
    pub fn new(factor2: Box<dyn NttStrategy<E>>) -> Self {
        Self { factor2 }
    }
}

impl<E: NttElement> NttStrategy<E> for Factor3NttStrategy<E> {
    fn transform(&self, storage: &DataStorage<E>, modulus: usize) -> NttResult<()> {
        let length = storage.size();
        check_length::<E>(length)?;
        let power2_length = length & length.wrapping_neg();

        if length == power2_length {
            return self.factor2.transform(storage, modulus);
        }
        assert_eq!(length, 3 * power2_length);

        let math = ModMath::<E>::new(modulus);
        let w = math.forward_nth_root(length)?;
        let w3 = math.mod_pow(w, power2_length);
        let weights = column_weights(&math, w, w3);

        let s0 = storage.subsequence(0, power2_length)?;
        let s1 = storage.subsequence(power2_length, power2_length)?;
        let s2 = storage.subsequence(2 * power2_length, power2_length)?;

        transform_columns(&math, false, &s0, &s1, &s2, power2_length, &weights)?;

        self.factor2.transform(&s0, modulus)?;
        self.factor2.transform(&s1, modulus)?;
        self.factor2.transform(&s2, modulus)
    }

    fn inverse_transform(
        &self,
        storage: &DataStorage<E>,
        modulus: usize,
        total_transform_length: u64,
    ) -> NttResult<()> {
        let length = storage.size();
        check_length::<E>(length.max(total_transform_length))?;
        let power2_length = length & length.wrapping_neg();

        if length == power2_length {
            return self
                .factor2
                .inverse_transform(storage, modulus, total_transform_length);
        }
        assert_eq!(length, 3 * power2_length);

        let math = ModMath::<E>::new(modulus);
        let w = math.inverse_nth_root(length)?;
        let w3 = math.mod_pow(w, power2_length);
        let weights = column_weights(&math, w, w3);

        let s0 = storage.subsequence(0, power2_length)?;
        let s1 = storage.subsequence(power2_length, power2_length)?;
        let s2 = storage.subsequence(2 * power2_length, power2_length)?;

        self.factor2
            .inverse_transform(&s0, modulus, total_transform_length)?;
        self.factor2
            .inverse_transform(&s1, modulus, total_transform_length)?;
        self.factor2
            .inverse_transform(&s2, modulus, total_transform_length)?;

        transform_columns(&math, true, &s0, &s1, &s2, power2_length, &weights)
    }

    fn transform_length(&self, size: u64) -> u64 {
        round23_up(size)
    }
}

/// Factor-3 on top of the six-step transform with the whole `3·2^k`
/// array resident: the column pass runs over one memory view instead of
/// three block iterators.
pub struct Factor3SixStepNttStrategy {
    six_step: SixStepFntStrategy,
    num_processors: usize,
}

impl Factor3SixStepNttStrategy {
    #[must_use]
    pub fn new(six_step: SixStepFntStrategy) -> Self {
        let num_processors = mpfloat_storage::Context::global().num_processors;
        Self {
            six_step,
            num_processors,
        }
    }

    fn columns_in_memory<E: NttElement>(
        math: &ModMath<E>,
        data: &mut [E],
        inverse: bool,
        weights: &ColumnWeights<E>,
    ) {
        let m = data.len() / 3;
        let (part0, rest) = data.split_at_mut(m);
        let (part1, part2) = rest.split_at_mut(m);

        let mut tmp1 = E::ONE;
        let mut tmp2 = E::ONE;
        for i in 0..m {
            let (x0, x1, x2) = dft3(
                math, part0[i], part1[i], part2[i], weights.w1, weights.w2, tmp1, tmp2, inverse,
            );
            part0[i] = x0;
            part1[i] = x1;
            part2[i] = x2;
            tmp1 = math.mod_multiply(tmp1, weights.w);
            tmp2 = math.mod_multiply(tmp2, weights.ww);
        }
    }
}

impl<E: NttElement> NttStrategy<E> for Factor3SixStepNttStrategy {
    fn transform(&self, storage: &DataStorage<E>, modulus: usize) -> NttResult<()> {
        let length = storage.size();
        check_length::<E>(length)?;
        let power2_length = length & length.wrapping_neg();

        if length == power2_length {
            return NttStrategy::<E>::transform(&self.six_step, storage, modulus);
        }
        assert_eq!(length, 3 * power2_length);

        let math = ModMath::<E>::new(modulus);
        let w = math.forward_nth_root(length)?;
        let w3 = math.mod_pow(w, power2_length);
        let weights = column_weights(&math, w, w3);

        #[allow(clippy::cast_possible_truncation)]
        {
            let mut array = storage.array(AccessMode::ReadWrite, 0, length as usize)?;
            Self::columns_in_memory(&math, &mut array, false, &weights);
            for part in array.chunks_mut(power2_length as usize) {
                six_step(&math, part, false, power2_length, self.num_processors)?;
            }
            array.close()?;
        }
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
        let power2_length = length & length.wrapping_neg();

        if length == power2_length {
            return NttStrategy::<E>::inverse_transform(
                &self.six_step,
                storage,
                modulus,
                total_transform_length,
            );
        }
        assert_eq!(length, 3 * power2_length);

        let math = ModMath::<E>::new(modulus);
        let w = math.inverse_nth_root(length)?;
        let w3 = math.mod_pow(w, power2_length);
        let weights = column_weights(&math, w, w3);

        #[allow(clippy::cast_possible_truncation)]
        {
            let mut array = storage.array(AccessMode::ReadWrite, 0, length as usize)?;
            for part in array.chunks_mut(power2_length as usize) {
                six_step(&math, part, true, total_transform_length, self.num_processors)?;
            }
            Self::columns_in_memory(&math, &mut array, true, &weights);
            array.close()?;
        }
        Ok(())
    }

    fn transform_length(&self, size: u64) -> u64 {
        round23_up(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_fnt::TableFntStrategy;

    fn fill(storage: &DataStorage<u32>, n: u64) -> Vec<u32> {
        let mut original = Vec::new();
        for i in 0..n {
            #[allow(clippy::cast_possible_truncation)]
            let v = (i as u32).wrapping_mul(2246822519).wrapping_add(7) % 1_000_000;
            storage.set(i, v).unwrap();
            original.push(v);
        }
        original
    }

    fn read_all(storage: &DataStorage<u32>, n: u64) -> Vec<u32> {
        (0..n).map(|i| storage.get(i).unwrap()).collect()
    }

    #[test]
    fn factor3_roundtrip_over_table() {
        for n in [3u64, 6, 12, 48, 192, 768] {
            let storage = DataStorage::<u32>::memory(n);
            let original = fill(&storage, n);
            let strategy = Factor3NttStrategy::new(Box::new(TableFntStrategy::new()));
            NttStrategy::<u32>::transform(&strategy, &storage, 0).unwrap();
            NttStrategy::<u32>::inverse_transform(&strategy, &storage, 0, n).unwrap();
            assert_eq!(read_all(&storage, n), original, "n={n}");
        }
    }

    #[test]
    fn factor3_passes_power_of_two_through() {
        let n = 64u64;
        let storage = DataStorage::<u32>::memory(n);
        let original = fill(&storage, n);
        let strategy = Factor3NttStrategy::new(Box::new(TableFntStrategy::new()));
        NttStrategy::<u32>::transform(&strategy, &storage, 1).unwrap();
        NttStrategy::<u32>::inverse_transform(&strategy, &storage, 1, n).unwrap();
        assert_eq!(read_all(&storage, n), original);
    }

    #[test]
    fn factor3_six_step_matches_generic() {
        let n = 3 * 256u64;
        let storage_a = DataStorage::<u32>::memory(n);
        let original = fill(&storage_a, n);
        let storage_b = DataStorage::<u32>::memory(n);
        for (i, &v) in original.iter().enumerate() {
            storage_b.set(i as u64, v).unwrap();
        }

        let generic = Factor3NttStrategy::new(Box::new(crate::six_step::SixStepFntStrategy::new()));
        let special = Factor3SixStepNttStrategy::new(SixStepFntStrategy::new());

        NttStrategy::<u32>::transform(&generic, &storage_a, 2).unwrap();
        NttStrategy::<u32>::transform(&special, &storage_b, 2).unwrap();
        assert_eq!(read_all(&storage_a, n), read_all(&storage_b, n));

        NttStrategy::<u32>::inverse_transform(&special, &storage_b, 2, n).unwrap();
        assert_eq!(read_all(&storage_b, n), original);
    }

    #[test]
    fn factor3_roundtrip_u64_moduli() {
        for index in 0..3 {
            let n = 96u64;
            let storage = DataStorage::<u64>::memory(n);
            let mut original = Vec::new();
            for i in 0..n {
                let v = i.wrapping_mul(0x9E37_79B9_7F4A_7C15) % 1_000_000_007;
                storage.set(i, v).unwrap();
                original.push(v);
            }
            let strategy = Factor3NttStrategy::new(Box::new(TableFntStrategy::new()));
            NttStrategy::<u64>::transform(&strategy, &storage, index).unwrap();
            NttStrategy::<u64>::inverse_transform(&strategy, &storage, index, n).unwrap();
            let after: Vec<u64> = (0..n).map(|i| storage.get(i).unwrap()).collect();
            assert_eq!(after, original, "modulus {index}");
        }
    }
}
