//! Three-modulus NTT convolution.
//!
//! Multiplies two digit sequences by running the same convolution under
//! three distinct primes and recombining with the carry-CRT. Small
//! operands take a schoolbook pass instead; the transform machinery only
//! pays off past the classical threshold.

use mpfloat_storage::{AccessMode, DataStorage};

use crate::builder::{round23_up, NttBuilder};
use crate::carry_crt::CarryCrt;
use crate::element::{base_for_radix, NttElement};
use crate::error::{NttError, NttResult};
use crate::modmath::ModMath;

/// Combined input size (in elements) below which schoolbook
/// multiplication beats the transform pipeline.
pub const CLASSICAL_THRESHOLD: u64 = 64;

/// Multiply two digit sequences, producing the `result_size` most
/// significant digits of the product in a new storage.
///
/// Digits are base-`radix^digits_per_element` elements, most significant
/// first. `result_size` may be at most `a_size + b_size`.
pub fn multiply<E: NttElement>(
    a: &DataStorage<E>,
    a_size: u64,
    b: &DataStorage<E>,
    b_size: u64,
    result_size: u64,
    radix: u32,
) -> NttResult<DataStorage<E>> {
    assert!(a_size >= 1 && b_size >= 1, "empty multiplicand");
    assert!(
        result_size >= 1 && result_size <= a_size + b_size,
        "result size {result_size} outside 1..={}",
        a_size + b_size
    );

    if a_size + b_size <= CLASSICAL_THRESHOLD {
        classical_multiply(a, a_size, b, b_size, result_size, radix)
    } else {
        ntt_multiply(a, a_size, b, b_size, result_size, radix)
    }
}

/// Schoolbook convolution with a 128-bit accumulator.
fn classical_multiply<E: NttElement>(
    a: &DataStorage<E>,
    a_size: u64,
    b: &DataStorage<E>,
    b_size: u64,
    result_size: u64,
    radix: u32,
) -> NttResult<DataStorage<E>> {
    let (base, _) = base_for_radix::<E>(radix)?;
    let base = u128::from(base);

    let read = |s: &DataStorage<E>, n: u64| -> NttResult<Vec<u128>> {
        let mut digits = Vec::with_capacity(n as usize);
        let mut it = s.iterator(AccessMode::Read, 0, n)?;
        for _ in 0..n {
            digits.push(it.get().to_u128());
            it.next()?;
        }
        Ok(digits)
    };
    let av = read(a, a_size)?;
    let bv = read(b, b_size)?;

    #[allow(clippy::cast_possible_truncation)]
    let (la, lb) = (a_size as usize, b_size as usize);
    let coeffs = la + lb - 1;
    let mut digits = vec![E::ZERO; la + lb];

    // Accumulate coefficients from the least significant end, emitting
    // one digit per position.
    let mut acc = 0u128;
    for k in (0..coeffs).rev() {
        let lo = k.saturating_sub(lb - 1);
        let hi = k.min(la - 1);
        for i in lo..=hi {
            acc += av[i] * bv[k - i];
        }
        digits[k + 1] = E::from_u128(acc % base);
        acc /= base;
    }
    debug_assert!(acc < base, "carry out of the product's top digit");
    digits[0] = E::from_u128(acc);

    let out = DataStorage::<E>::create(result_size)?;
    let mut it = out.iterator(AccessMode::Write, 0, result_size)?;
    for &d in digits.iter().take(result_size as usize) {
        it.set(d);
        it.next()?;
    }
    it.close()?;
    Ok(out)
}

/// The transform pipeline: three NTT convolutions plus carry-CRT.
fn ntt_multiply<E: NttElement>(
    a: &DataStorage<E>,
    a_size: u64,
    b: &DataStorage<E>,
    b_size: u64,
    result_size: u64,
    radix: u32,
) -> NttResult<DataStorage<E>> {
    let length = round23_up(a_size + b_size);
    if length > E::MAX_TRANSFORM_LENGTH {
        return Err(NttError::TransformLengthExceeded {
            length,
            max: E::MAX_TRANSFORM_LENGTH,
        });
    }

    let strategy = NttBuilder::create::<E>(length);
    let crt = CarryCrt::<E>::new(radix)?;
    let mut residues = Vec::with_capacity(3);

    for modulus in 0..3 {
        // Both operands share one storage: the second lives in the upper
        // half, so a single allocation serves the whole convolution.
        let storage = DataStorage::<E>::create(2 * length)?;
        let math = ModMath::<E>::new(modulus);

        scatter(&math, a, a_size, &storage, 0)?;
        scatter(&math, b, b_size, &storage, length)?;

        let lower = storage.subsequence(0, length)?;
        let upper = storage.subsequence(length, length)?;

        strategy.transform(&lower, modulus)?;
        strategy.transform(&upper, modulus)?;

        pointwise_multiply(&math, &lower, &upper, length)?;

        strategy.inverse_transform(&lower, modulus, length)?;
        residues.push(lower);
    }

    crt.carry_crt(&residues[0], &residues[1], &residues[2], result_size)
}

/// Copy `size` digits into `dst` at `offset`, reduced modulo the active
/// prime. The remainder of the half stays zero-padded.
fn scatter<E: NttElement>(
    math: &ModMath<E>,
    src: &DataStorage<E>,
    size: u64,
    dst: &DataStorage<E>,
    offset: u64,
) -> NttResult<()> {
    let p = math.modulus().to_u128();
    let mut read = src.iterator(AccessMode::Read, 0, size)?;
    let mut write = dst.iterator(AccessMode::Write, offset, offset + size)?;
    for _ in 0..size {
        write.set(E::from_u128(read.get().to_u128() % p));
        read.next()?;
        write.next()?;
    }
    write.close()?;
    Ok(())
}

fn pointwise_multiply<E: NttElement>(
    math: &ModMath<E>,
    lower: &DataStorage<E>,
    upper: &DataStorage<E>,
    length: u64,
) -> NttResult<()> {
    let mut dst = lower.iterator(AccessMode::ReadWrite, 0, length)?;
    let mut src = upper.iterator(AccessMode::Read, 0, length)?;
    for _ in 0..length {
        dst.set(math.mod_multiply(dst.get(), src.get()));
        dst.next()?;
        src.next()?;
    }
    dst.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn storage_from(digits: &[u64]) -> DataStorage<u32> {
        let s = DataStorage::<u32>::memory(digits.len() as u64);
        for (i, &d) in digits.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            s.set(i as u64, d as u32).unwrap();
        }
        s
    }

    fn to_biguint(digits: &[u64], base: u64) -> BigUint {
        digits
            .iter()
            .fold(BigUint::ZERO, |acc, &d| acc * base + BigUint::from(d))
    }

    fn check(a_digits: &[u64], b_digits: &[u64]) {
        let (base, _) = base_for_radix::<u32>(10).unwrap();
        let a = storage_from(a_digits);
        let b = storage_from(b_digits);
        let result_size = (a_digits.len() + b_digits.len()) as u64;
        let product = multiply(
            &a,
            a_digits.len() as u64,
            &b,
            b_digits.len() as u64,
            result_size,
            10,
        )
        .unwrap();

        let digits: Vec<u64> = (0..result_size)
            .map(|i| u64::from(product.get(i).unwrap()))
            .collect();
        assert_eq!(
            to_biguint(&digits, base),
            to_biguint(a_digits, base) * to_biguint(b_digits, base),
            "a={a_digits:?} b={b_digits:?}"
        );
    }

    #[test]
    fn classical_small_products() {
        check(&[7], &[6]);
        check(&[123_456_789], &[987_654_321]);
        check(&[1, 0], &[999_999_999, 999_999_999]);
        check(&[12, 345_678_901], &[98, 765_432_109]);
    }

    #[test]
    fn ntt_path_products() {
        // 40 + 40 digits crosses CLASSICAL_THRESHOLD = 64 (length 96).
        let a: Vec<u64> = (0..40).map(|i| (i * 123_456_789 + 7) % 1_000_000_000).collect();
        let b: Vec<u64> = (0..40).map(|i| (i * 987_654_321 + 11) % 1_000_000_000).collect();
        check(&a, &b);

        // 64 + 64 digits uses a pure power-of-two transform (length 128).
        let a: Vec<u64> = (0..64).map(|i| (i * 71 + 13) % 1_000_000_000).collect();
        let b: Vec<u64> = (0..64).map(|i| (i * 53 + 29) % 1_000_000_000).collect();
        check(&a, &b);
    }

    #[test]
    fn ntt_factor3_length() {
        // 50 + 46 = 96 = 3·32 exercises the factor-3 wrapper.
        let a: Vec<u64> = (0..50).map(|i| (i * 37) % 1_000_000_000).collect();
        let b: Vec<u64> = (0..46).map(|i| (i * 91 + 1) % 1_000_000_000).collect();
        check(&a, &b);
    }

    #[test]
    fn asymmetric_operands() {
        let a: Vec<u64> = (0..100).map(|i| (i * 7 + 5) % 1_000_000_000).collect();
        check(&a, &[999_999_999]);
    }

    #[test]
    fn truncated_product() {
        let a: Vec<u64> = (0..48).map(|i| (i * 13 + 1) % 1_000_000_000).collect();
        let b: Vec<u64> = (0..48).map(|i| (i * 17 + 2) % 1_000_000_000).collect();
        let (base, _) = base_for_radix::<u32>(10).unwrap();

        let sa = storage_from(&a);
        let sb = storage_from(&b);
        let full = multiply(&sa, 48, &sb, 48, 96, 10).unwrap();
        // result_size 94 keeps every convolution coefficient in the carry
        // pass, so the kept digits are exact.
        let truncated = multiply(&sa, 48, &sb, 48, 94, 10).unwrap();

        let _ = base;
        for i in 0..94 {
            assert_eq!(truncated.get(i).unwrap(), full.get(i).unwrap(), "digit {i}");
        }
    }

    #[test]
    fn u64_width_products() {
        let digits_a = [123_456_789_012_345_678u64, 900_000_000_000_000_001];
        let digits_b = [999_999_999_999_999_999u64, 2];
        let (base, _) = base_for_radix::<u64>(10).unwrap();

        let a = DataStorage::<u64>::memory(2);
        let b = DataStorage::<u64>::memory(2);
        for i in 0..2u64 {
            a.set(i, digits_a[i as usize]).unwrap();
            b.set(i, digits_b[i as usize]).unwrap();
        }
        let product = multiply(&a, 2, &b, 2, 4, 10).unwrap();
        let digits: Vec<u64> = (0..4).map(|i| product.get(i).unwrap()).collect();

        let big = |d: &[u64]| {
            d.iter()
                .fold(BigUint::ZERO, |acc, &x| acc * base + BigUint::from(x))
        };
        assert_eq!(big(&digits), big(&digits_a) * big(&digits_b));
    }
}
