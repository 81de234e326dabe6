//! Element widths and their modulus sets.
//!
//! Each element width carries three primes `p0 > p1 > p2` of the form
//! `k·2^m + 1`, all with `3 | p−1` so the factor-3 wrapper has a cube
//! root of unity under every modulus. Transform lengths are bounded by
//! the smallest 2-adicity in the set; the digit base is bounded so that
//! `max_transform_length · (base − 1)^2 < p0·p1·p2`, the condition for
//! the Chinese Remainder reconstruction to be exact.

use mpfloat_storage::Element;

use crate::error::{NttError, NttResult};

/// A digit element usable under the three-modulus NTT.
pub trait NttElement: Element {
    /// The three convolution primes, in decreasing order.
    const MODULUS: [Self; 3];
    /// Distinct prime factors of `p − 1` for each modulus, used to derive
    /// primitive roots at run time.
    const ORDER_FACTORS: [&'static [u64]; 3];
    /// Largest supported transform length (`3·2^k`).
    const MAX_TRANSFORM_LENGTH: u64;
    /// Largest digit base such that the CRT bound holds.
    const MAX_BASE: u64;
}

impl NttElement for u8 {
    // 241 = 15·2^4+1, 193 = 3·2^6+1, 97 = 3·2^5+1
    const MODULUS: [u8; 3] = [241, 193, 97];
    const ORDER_FACTORS: [&'static [u64]; 3] = [&[2, 3, 5], &[2, 3], &[2, 3]];
    const MAX_TRANSFORM_LENGTH: u64 = 48;
    const MAX_BASE: u64 = 255;
}

impl NttElement for u16 {
    // 61441 = 15·2^12+1, 18433 = 9·2^11+1, 12289 = 3·2^12+1
    const MODULUS: [u16; 3] = [61441, 18433, 12289];
    const ORDER_FACTORS: [&'static [u64]; 3] = [&[2, 3, 5], &[2, 3], &[2, 3]];
    const MAX_TRANSFORM_LENGTH: u64 = 6144;
    const MAX_BASE: u64 = 47000;
}

impl NttElement for u32 {
    // 2113929217 = 63·2^25+1, 2013265921 = 15·2^27+1, 1811939329 = 27·2^26+1
    const MODULUS: [u32; 3] = [2_113_929_217, 2_013_265_921, 1_811_939_329];
    const ORDER_FACTORS: [&'static [u64]; 3] = [&[2, 3, 7], &[2, 3, 5], &[2, 3]];
    const MAX_TRANSFORM_LENGTH: u64 = 3 << 25;
    const MAX_BASE: u64 = u32::MAX as u64;
}

impl NttElement for u64 {
    // 2^64−2^32+1, 1945555039024054273 = 27·2^56+1, 3221225473 = 3·2^30+1
    const MODULUS: [u64; 3] = [
        18_446_744_069_414_584_321,
        1_945_555_039_024_054_273,
        3_221_225_473,
    ];
    const ORDER_FACTORS: [&'static [u64]; 3] = [
        &[2, 3, 5, 17, 257, 65537],
        &[2, 3],
        &[2, 3],
    ];
    const MAX_TRANSFORM_LENGTH: u64 = 3 << 30;
    const MAX_BASE: u64 = 5_000_000_000_000_000_000;
}

/// The largest power of `radix` that fits the element width's base bound,
/// together with the per-element digit count.
///
/// # Errors
///
/// Returns [`NttError::InvalidRadix`] when `radix` is outside 2..=36.
pub fn base_for_radix<E: NttElement>(radix: u32) -> NttResult<(u64, u32)> {
    if !(2..=36).contains(&radix) {
        return Err(NttError::InvalidRadix(radix));
    }
    let radix = u64::from(radix);
    let mut base = radix;
    let mut digits = 1;
    while let Some(next) = base.checked_mul(radix) {
        if next > E::MAX_BASE {
            break;
        }
        base = next;
        digits += 1;
    }
    Ok((base, digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn check_set<E: NttElement>() {
        let [p0, p1, p2] = E::MODULUS;
        assert!(p0 > p1 && p1 > p2);

        let big = |p: E| BigUint::from(p.to_u64());
        for (p, factors) in E::MODULUS.iter().zip(E::ORDER_FACTORS) {
            let order = p.to_u64() - 1;
            // The full transform length (including the factor of 3)
            // divides p−1 for every modulus.
            assert_eq!(order % E::MAX_TRANSFORM_LENGTH, 0, "bad 2-adicity for {p}");
            // The factor list covers p−1 completely.
            let mut rest = order;
            for &q in factors {
                while rest % q == 0 {
                    rest /= q;
                }
            }
            assert_eq!(rest, 1, "incomplete factor list for {p}");
        }

        // CRT bound: L·(B−1)^2 < p0·p1·p2.
        let product = big(p0) * big(p1) * big(p2);
        let bound =
            BigUint::from(E::MAX_TRANSFORM_LENGTH) * BigUint::from(E::MAX_BASE - 1).pow(2);
        assert!(bound < product, "CRT bound violated");
    }

    #[test]
    fn modulus_sets_are_consistent() {
        check_set::<u8>();
        check_set::<u16>();
        check_set::<u32>();
        check_set::<u64>();
    }

    #[test]
    fn moduli_are_prime() {
        fn is_prime(n: u64) -> bool {
            if n < 2 {
                return false;
            }
            let mut d = 2u64;
            while d.saturating_mul(d) <= n {
                if n % d == 0 {
                    return false;
                }
                d += 1;
            }
            true
        }
        // Trial division is fine for everything below the u64 set.
        for p in u8::MODULUS {
            assert!(is_prime(u64::from(p)));
        }
        for p in u16::MODULUS {
            assert!(is_prime(u64::from(p)));
        }
        for p in u32::MODULUS {
            assert!(is_prime(u64::from(p)));
        }
        // The u64 primes are checked with a deterministic Miller-Rabin.
        for p in u64::MODULUS {
            assert!(miller_rabin(p));
        }
    }

    fn miller_rabin(n: u64) -> bool {
        if n < 2 {
            return false;
        }
        for p in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
            if n == p {
                return true;
            }
            if n % p == 0 {
                return false;
            }
        }
        let mut d = n - 1;
        let mut s = 0;
        while d % 2 == 0 {
            d /= 2;
            s += 1;
        }
        let pow = |mut b: u128, mut e: u64, m: u128| {
            let mut acc = 1u128;
            b %= m;
            while e > 0 {
                if e & 1 == 1 {
                    acc = acc * b % m;
                }
                b = b * b % m;
                e >>= 1;
            }
            acc
        };
        // Deterministic witness set for the full u64 range.
        'witness: for a in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
            let mut x = pow(u128::from(a), d, u128::from(n));
            if x == 1 || x == u128::from(n - 1) {
                continue;
            }
            for _ in 0..s - 1 {
                x = x * x % u128::from(n);
                if x == u128::from(n - 1) {
                    continue 'witness;
                }
            }
            return false;
        }
        true
    }

    #[test]
    fn base_for_radix_ten() {
        assert_eq!(base_for_radix::<u8>(10).unwrap(), (100, 2));
        assert_eq!(base_for_radix::<u16>(10).unwrap(), (10_000, 4));
        assert_eq!(base_for_radix::<u32>(10).unwrap(), (1_000_000_000, 9));
        assert_eq!(
            base_for_radix::<u64>(10).unwrap(),
            (1_000_000_000_000_000_000, 18)
        );
        assert!(base_for_radix::<u32>(1).is_err());
        assert!(base_for_radix::<u32>(37).is_err());
    }
}
