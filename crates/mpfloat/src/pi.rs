//! π to arbitrary precision, by the Chudnovskys' binary splitting
//! series.
//!
//! The splitting state (T, Q, P and the term count) is kept per radix so
//! a later, higher-precision request only computes the additional terms
//! and improves the cached inverse square root from its previous value.

use crate::caches::RadixCache;
use crate::error::{ApfloatError, ApfloatResult};
use crate::newton::inverse_root_with;
use crate::value::{Apfloat, EXTRA_PRECISION, INFINITE};

/// Cached binary-splitting state for one radix.
struct PiState {
    terms: i64,
    t: Apfloat,
    q: Apfloat,
    p: Apfloat,
    inverse_root: Apfloat,
    pi: Apfloat,
}

static PI_CACHE: std::sync::LazyLock<RadixCache<PiState>> =
    std::sync::LazyLock::new(RadixCache::new);

/// π to `precision` digits in the given radix.
pub fn pi(precision: u64, radix: u32) -> ApfloatResult<Apfloat> {
    Apfloat::check_radix(radix)?;
    if precision == 0 {
        return Err(ApfloatError::Precision("precision is not positive"));
    }
    if precision == INFINITE {
        return Err(ApfloatError::Precision(
            "cannot calculate pi to infinite precision",
        ));
    }

    let entry = PI_CACHE.entry(radix);
    let mut guard = entry.lock();

    if let Some(state) = guard.as_ref() {
        if state.pi.precision() >= precision {
            return Ok(state.pi.with_precision(precision));
        }
    }

    tracing::debug!(radix, precision, "extending pi cache");
    let state = calculate_pi(precision, radix, guard.take())?;
    let result = state.pi.with_precision(precision);
    *guard = Some(state);
    Ok(result)
}

pub(crate) fn clear_cache() {
    PI_CACHE.clear();
}

/// Term generators of the Chudnovsky series, all in exact integer
/// arithmetic.
struct PiCalculator {
    term_a: Apfloat,
    term_b: Apfloat,
    j: Apfloat,
    one: Apfloat,
    two: Apfloat,
    five: Apfloat,
    six: Apfloat,
    radix: u32,
}

impl PiCalculator {
    fn new(radix: u32) -> Self {
        Self {
            term_a: Apfloat::integer(13_591_409, radix),
            term_b: Apfloat::integer(545_140_134, radix),
            j: Apfloat::integer(10_939_058_860_032_000, radix),
            one: Apfloat::integer(1, radix),
            two: Apfloat::integer(2, radix),
            five: Apfloat::integer(5, radix),
            six: Apfloat::integer(6, radix),
            radix,
        }
    }

    /// `a(n) = (−1)^n (A + B·n)`.
    fn a(&self, n: i64) -> ApfloatResult<Apfloat> {
        let s = Apfloat::integer(n, self.radix);
        let v = self.term_a.add(&self.term_b.multiply(&s)?);
        Ok(if n & 1 == 0 { v } else { v.negate() })
    }

    /// `p(n) = (6n−1)(2n−1)(6n−5)`, with `p(0) = 1`.
    fn p(&self, n: i64) -> ApfloatResult<Apfloat> {
        if n == 0 {
            return Ok(self.one.clone());
        }
        let f = Apfloat::integer(n, self.radix);
        let six_f = self.six.multiply(&f)?;
        six_f
            .subtract(&self.one)
            .multiply(&self.two.multiply(&f)?.subtract(&self.one))?
            .multiply(&six_f.subtract(&self.five))
    }

    /// `q(n) = J·n³`, with `q(0) = 1`.
    fn q(&self, n: i64) -> ApfloatResult<Apfloat> {
        if n == 0 {
            return Ok(self.one.clone());
        }
        let f = Apfloat::integer(n, self.radix);
        self.j.multiply(&f)?.multiply(&f)?.multiply(&f)
    }

    /// Binary splitting of terms `[n1, n2)`: returns `(T, Q, P)`.
    fn r(&self, n1: i64, n2: i64) -> ApfloatResult<(Apfloat, Apfloat, Apfloat)> {
        debug_assert!(n1 < n2);
        match n2 - n1 {
            1 => {
                let p0 = self.p(n1)?;
                Ok((self.a(n1)?.multiply(&p0)?, self.q(n1)?, p0))
            }
            2 => {
                let p0 = self.p(n1)?;
                let p01 = p0.multiply(&self.p(n1 + 1)?)?;
                let q1 = self.q(n1 + 1)?;
                let t = q1
                    .multiply(&self.a(n1)?)?
                    .multiply(&p0)?
                    .add(&self.a(n1 + 1)?.multiply(&p01)?);
                Ok((t, self.q(n1)?.multiply(&q1)?, p01))
            }
            3 => {
                let p0 = self.p(n1)?;
                let p01 = p0.multiply(&self.p(n1 + 1)?)?;
                let p012 = p01.multiply(&self.p(n1 + 2)?)?;
                let q2 = self.q(n1 + 2)?;
                let q12 = self.q(n1 + 1)?.multiply(&q2)?;
                let t = q12
                    .multiply(&self.a(n1)?)?
                    .multiply(&p0)?
                    .add(&q2.multiply(&self.a(n1 + 1)?)?.multiply(&p01)?)
                    .add(&self.a(n1 + 2)?.multiply(&p012)?);
                Ok((t, self.q(n1)?.multiply(&q12)?, p012))
            }
            4 => {
                let p0 = self.p(n1)?;
                let p01 = p0.multiply(&self.p(n1 + 1)?)?;
                let p012 = p01.multiply(&self.p(n1 + 2)?)?;
                let p0123 = p012.multiply(&self.p(n1 + 3)?)?;
                let q3 = self.q(n1 + 3)?;
                let q23 = self.q(n1 + 2)?.multiply(&q3)?;
                let q123 = self.q(n1 + 1)?.multiply(&q23)?;
                let t = q123
                    .multiply(&self.a(n1)?)?
                    .multiply(&p0)?
                    .add(&q23.multiply(&self.a(n1 + 1)?)?.multiply(&p01)?)
                    .add(&q3.multiply(&self.a(n1 + 2)?)?.multiply(&p012)?)
                    .add(&self.a(n1 + 3)?.multiply(&p0123)?);
                Ok((t, self.q(n1)?.multiply(&q123)?, p0123))
            }
            _ => {
                let middle = (n1 + n2) / 2;
                let (lt, lq, lp) = self.r(n1, middle)?;
                let (rt, rq, rp) = self.r(middle, n2)?;
                Ok((
                    rq.multiply(&lt)?.add(&lp.multiply(&rt)?),
                    lq.multiply(&rq)?,
                    lp.multiply(&rp)?,
                ))
            }
        }
    }
}

/// Run (or extend) the Chudnovsky calculation to `precision` digits.
fn calculate_pi(precision: u64, radix: u32, previous: Option<PiState>) -> ApfloatResult<PiState> {
    let calculator = PiCalculator::new(radix);

    // Each series term yields log(151931373056000)/log(radix) digits.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let needed_terms = (precision as f64 * f64::from(radix).ln() / 32.654_450_041_77) as i64;
    let working_precision = precision + EXTRA_PRECISION;

    let constant = Apfloat::integer_with_precision(640_320, working_precision, radix);

    let (t, q, p, inverse_root) = match previous {
        Some(state) if state.terms <= needed_terms + 1 => {
            let (mut t, mut q, mut p) = (state.t, state.q, state.p);
            if state.terms < needed_terms + 1 {
                // Only the new terms need computing.
                let (rt, rq, rp) = calculator.r(state.terms, needed_terms + 1)?;
                t = rq.multiply(&t)?.add(&p.multiply(&rt)?);
                q = q.multiply(&rq)?;
                p = p.multiply(&rp)?;
            }
            // Improve the inverse root from its previous precision.
            let inverse_root = inverse_root_with(
                &constant,
                2,
                working_precision,
                Some(&state.inverse_root),
                state.inverse_root.precision(),
            )?;
            (t, q, p, inverse_root)
        }
        _ => {
            let (t, q, p) = calculator.r(0, needed_terms + 1)?;
            let inverse_root = inverse_root_with(&constant, 2, working_precision, None, 0)?;
            (t, q, p, inverse_root)
        }
    };

    // π = 53360·√640320 · Q / T
    let pi = inverse_root_with(&inverse_root.multiply(&t)?, 1, working_precision, None, 0)?
        .multiply(&Apfloat::integer(53_360, radix))?
        .multiply(&q)?;

    let inverse_root = inverse_root.with_precision(precision);
    let pi = pi.with_precision(precision);

    Ok(PiState {
        terms: needed_terms + 1,
        t,
        q,
        p,
        inverse_root,
        pi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PI_DIGITS: &str = "3.1415926535897932384626433832795028841971693993751058209749445923078164062862";

    fn assert_digits(value: &Apfloat, expected: &str) {
        // The last printed digit is rounded, so compare one short of it.
        let printed = value.to_string();
        let check = printed.len().min(expected.len()).saturating_sub(1);
        assert_eq!(
            &printed[..check],
            &expected[..check],
            "full output: {printed}"
        );
    }

    #[test]
    fn pi_small_precisions() {
        assert_digits(&pi(5, 10).unwrap(), "3.1416");
        assert_digits(&pi(10, 10).unwrap(), "3.141592654");
    }

    #[test]
    fn pi_fifty_digits() {
        let value = pi(50, 10).unwrap();
        assert_eq!(
            value.to_string(),
            "3.1415926535897932384626433832795028841971693993751"
        );
    }

    #[test]
    fn pi_cache_extension_is_consistent() {
        // Ask for successively higher precision through the cache; the
        // extended state must agree with the reference digits.
        for precision in [12u64, 30, 55, 75] {
            assert_digits(&pi(precision, 10).unwrap(), PI_DIGITS);
        }
        // And a lower-precision request afterwards is served from cache.
        assert_digits(&pi(20, 10).unwrap(), PI_DIGITS);
    }

    #[test]
    fn pi_other_radix() {
        // π in base 16 = 3.243f6a8885a308d31319...
        let value = pi(20, 16).unwrap();
        assert_digits(&value, "3.243f6a8885a308d3131");
    }

    #[test]
    fn pi_rejects_bad_precision() {
        assert!(pi(0, 10).is_err());
        assert!(pi(INFINITE, 10).is_err());
        assert!(pi(10, 1).is_err());
    }
}
