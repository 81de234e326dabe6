//! Arithmetic-geometric mean, logarithm and exponential.
//!
//! The logarithm uses the AGM identity with the argument scaled into
//! `[1/radix, 1)`; the per-radix `log(radix)` constant is cached in two
//! forms, with and without the factor of π, so that base-`b` logarithms
//! can avoid computing π altogether. The exponential inverts the
//! logarithm with the precision-doubling Newton schedule.

use crate::caches::RadixCache;
use crate::error::{ApfloatError, ApfloatResult};
use crate::newton::{divide, sqrt};
use crate::pi::pi;
use crate::value::{Apfloat, EXTRA_PRECISION, INFINITE};

/// Arithmetic-geometric mean of two values.
pub fn agm(a: &Apfloat, b: &Apfloat) -> ApfloatResult<Apfloat> {
    if a.signum() == 0 || b.signum() == 0 {
        // Would not converge quadratically.
        return Ok(Apfloat::zero(a.radix()));
    }

    let working_precision = a.precision().min(b.precision());
    let target_precision = a.precision().max(b.precision());
    if working_precision == INFINITE {
        return Err(ApfloatError::Precision(
            "cannot calculate agm to infinite precision",
        ));
    }

    // Some extra precision is required for the iteration to stay accurate.
    let working_precision = working_precision + EXTRA_PRECISION;
    let mut a = a.ensure_precision(working_precision);
    let mut b = b.ensure_precision(working_precision);

    let half_working = working_precision.div_ceil(2);
    const CONVERGING: u64 = 1000;
    let mut precision = 0u64;

    // First iterate until convergence is established.
    while precision < CONVERGING && precision < half_working {
        let t = a.add(&b).divide_small(2)?;
        b = sqrt(&a.multiply(&b)?)?;
        a = t;

        a = a.ensure_precision(working_precision);
        b = b.ensure_precision(working_precision);

        precision = a.equal_digits(&b);
    }

    // From here on the iteration converges quadratically.
    while precision <= half_working {
        let t = a.add(&b).divide_small(2)?;
        b = sqrt(&a.multiply(&b)?)?;
        a = t;

        a = a.ensure_precision(working_precision);
        b = b.ensure_precision(working_precision);

        precision = precision.saturating_mul(2).max(1);
    }

    Ok(a.add(&b).divide_small(2)?.with_precision(target_precision))
}

/// Natural logarithm.
pub fn log(x: &Apfloat) -> ApfloatResult<Apfloat> {
    log_impl(x, true)
}

/// Base-`b` logarithm, computed as a ratio of the π-free forms so π
/// itself is never needed.
pub fn log_base(x: &Apfloat, b: &Apfloat) -> ApfloatResult<Apfloat> {
    let target = x.precision().min(b.precision());
    let x = x.with_precision(target);
    let b = b.with_precision(target);
    divide(&log_impl(&x, false)?, &log_impl(&b, false)?)
}

fn log_impl(x: &Apfloat, multiply_by_pi: bool) -> ApfloatResult<Apfloat> {
    if x.signum() <= 0 {
        return Err(ApfloatError::Arithmetic(if x.signum() == 0 {
            "logarithm of zero"
        } else {
            "logarithm of negative number; result would be complex"
        }));
    }
    if x.is_one() {
        return Ok(Apfloat::zero(x.radix()));
    }

    let target_precision = x.precision();
    if target_precision == INFINITE {
        return Err(ApfloatError::Precision(
            "cannot calculate logarithm to infinite precision",
        ));
    }

    // The agm converges badly for large arguments: scale into
    // [1/radix, 1) and add back the appropriate multiple of log(radix).
    let one = Apfloat::one(x.radix());
    let final_precision = target_precision
        .saturating_sub(one.equal_digits(x))
        .max(1);

    let original_scale = x.scale();
    let x = x.scaled(-original_scale);

    let radix_power = if original_scale == 0 {
        Apfloat::zero(x.radix())
    } else {
        let log_radix = log_radix_impl(target_precision, x.radix(), multiply_by_pi)?.extended();
        log_radix.multiply(&Apfloat::integer(original_scale, x.radix()))?
    };

    Ok(raw_log(&x, multiply_by_pi)?
        .extended()
        .add(&radix_power)
        .with_precision(final_precision))
}

/// Logarithm of an argument already in `[1/radix, 1)` via the AGM
/// identity. With `multiply_by_pi` false the result is `log(x)/π`.
fn raw_log(x: &Apfloat, multiply_by_pi: bool) -> ApfloatResult<Apfloat> {
    debug_assert!(x.signum() > 0);
    let radix = x.radix();
    let target_precision = x.precision();

    let one = Apfloat::one(radix);
    const LOG_EXTRA: u64 = 25;

    let working_precision = target_precision + EXTRA_PRECISION;
    #[allow(clippy::cast_possible_wrap)]
    let n = (target_precision / 2 + LOG_EXTRA) as i64; // rough scale estimate

    let x = x.with_precision(target_precision + LOG_EXTRA);

    let e = one.with_precision(working_precision).scaled(-n);
    let x = x.scaled(-n);

    let agm_e = agm(&one, &e)?.extended();
    let agm_ex = agm(&one, &x)?.extended();

    let mut log = agm_ex.subtract(&agm_e).with_precision(working_precision);
    if multiply_by_pi {
        log = pi(target_precision, radix)?.extended().multiply(&log)?;
    }
    let denominator = Apfloat::integer(2, radix)
        .multiply(&agm_e)?
        .multiply(&agm_ex)?;
    log = divide(&log, &denominator)?;

    Ok(log.with_precision(target_precision))
}

static LOG_CACHE: std::sync::LazyLock<RadixCache<Apfloat>> =
    std::sync::LazyLock::new(RadixCache::new);
static LOG_PI_CACHE: std::sync::LazyLock<RadixCache<Apfloat>> =
    std::sync::LazyLock::new(RadixCache::new);

/// Natural logarithm of the radix itself, cached per radix.
pub fn log_radix(precision: u64, radix: u32) -> ApfloatResult<Apfloat> {
    log_radix_impl(precision, radix, true)
}

fn log_radix_impl(precision: u64, radix: u32, multiply_by_pi: bool) -> ApfloatResult<Apfloat> {
    Apfloat::check_radix(radix)?;
    let cache = if multiply_by_pi {
        &LOG_PI_CACHE
    } else {
        &LOG_CACHE
    };
    let entry = cache.entry(radix);
    let mut guard = entry.lock();

    if let Some(cached) = guard.as_ref() {
        if cached.precision() >= precision {
            return Ok(cached.with_precision(precision));
        }
    }
    tracing::debug!(radix, precision, multiply_by_pi, "extending log(radix) cache");

    let value = if multiply_by_pi {
        // The real log(radix) is the π-free form times π.
        let plain = log_radix_impl(precision, radix, false)?.extended();
        let pi_value = pi(precision, radix)?.extended();
        plain.multiply(&pi_value)?.with_precision(precision)
    } else {
        // log(1/radix) = −log(radix), with the argument exactly
        // representable as 0.1 in the radix.
        let tenth = Apfloat::one(radix)
            .with_precision(precision)
            .scaled(-1);
        raw_log(&tenth, false)?.negate()
    };

    *guard = Some(value.clone());
    Ok(value)
}

/// Exponential function, via Newton's iteration on the logarithm.
pub fn exp(x: &Apfloat) -> ApfloatResult<Apfloat> {
    let radix = x.radix();
    if x.signum() == 0 {
        return Ok(Apfloat::one(radix));
    }

    let double_precision = Apfloat::double_precision(radix);
    let mut target_precision = x.precision();
    // Arguments close to zero give more accurate results.
    if target_precision != INFINITE {
        #[allow(clippy::cast_sign_loss)]
        let boost = (1 - x.scale()).max(0) as u64;
        target_precision = target_precision.saturating_add(boost).min(INFINITE - 1);
    } else {
        return Err(ApfloatError::Precision(
            "cannot calculate exponent to infinite precision",
        ));
    }

    // Overflow guard: the result's scale would exceed the representable
    // exponent range.
    #[allow(clippy::cast_precision_loss)]
    let limit = Apfloat::from_f64(
        i64::MAX as f64 * f64::from(radix).ln(),
        double_precision,
        radix,
    );
    if x.compare(&limit) != std::cmp::Ordering::Less {
        return Err(ApfloatError::Overflow);
    }

    #[allow(clippy::cast_possible_wrap)]
    if x.scale() <= i64::MIN / 2 + EXTRA_PRECISION as i64 {
        // So small that exp(x) = 1 + x to full precision.
        return Ok(Apfloat::one(radix).add(x));
    }

    let (mut result, mut precision);
    #[allow(clippy::cast_possible_wrap)]
    if x.scale() < -(double_precision as i64) / 2 {
        // Taylor shortcut: exp(x) ≈ 1 + x.
        #[allow(clippy::cast_sign_loss)]
        {
            precision = (-2 * x.scale()) as u64;
        }
        result = Apfloat::one(radix).with_precision(precision).add(x);
    } else {
        // Seed from double arithmetic: split x/ln(radix) into integer
        // and fractional parts so only the fraction is exponentiated.
        let value = x.to_f64() / f64::from(radix).ln();
        let integer_part = value.floor();
        let fractional_part = value - integer_part;

        #[allow(clippy::cast_possible_truncation)]
        {
            result = Apfloat::from_f64(
                f64::from(radix).powf(fractional_part),
                double_precision,
                radix,
            )
            .scaled(integer_part as i64);
        }

        let integer_digits = if integer_part > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                ((integer_part + 0.5).ln() / f64::from(radix).ln()).floor() as u64
            }
        } else {
            0
        };
        precision = double_precision.saturating_sub(integer_digits).max(1);
    }

    let mut iterations: i64 = 0;
    let mut max_precision = precision;
    while max_precision < target_precision {
        max_precision = max_precision.saturating_mul(2);
        iterations += 1;
    }

    let mut precising_iteration = iterations;
    let mut min_precision = i128::from(precision);
    while precising_iteration > 0 {
        if (min_precision - i128::from(EXTRA_PRECISION)) << precising_iteration
            >= i128::from(target_precision)
        {
            break;
        }
        precising_iteration -= 1;
        min_precision <<= 1;
    }

    if iterations > 0 {
        // Precompute the needed radix logarithm to full precision once.
        log_radix(target_precision, radix)?;
    }

    let x = x.extended();

    while iterations > 0 {
        iterations -= 1;
        precision = precision.saturating_mul(2);
        result = result.with_precision(precision.min(target_precision));

        let mut t = log_impl(&result, true)?;
        t = if iterations == 0 && precising_iteration != 0 {
            t.extended()
        } else {
            t
        };
        t = x.subtract(&t);
        if iterations < precising_iteration {
            t = t.with_precision((precision / 2).max(1));
        }

        if iterations == 0 && precising_iteration != 0 {
            result = result.extended();
        }
        result = result.add(&result.multiply(&t)?);

        if iterations == precising_iteration {
            let t = log_impl(&result, true)?.extended();
            result = result.extended();
            result = result.add(&result.multiply(&x.subtract(&t))?);
        }
    }

    Ok(result.with_precision(target_precision))
}

pub(crate) fn clear_caches() {
    LOG_CACHE.clear();
    LOG_PI_CACHE.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_digits(value: &Apfloat, expected: &str) {
        let printed = value.to_string();
        let check = printed.len().min(expected.len());
        assert_eq!(
            &printed[..check],
            &expected[..check],
            "full output: {printed}"
        );
    }

    #[test]
    fn agm_of_one_and_two() {
        // agm(1, 2) = 1.4567910310469068691864323832650819749738639432213…
        let a = Apfloat::integer_with_precision(1, 40, 10);
        let b = Apfloat::integer_with_precision(2, 40, 10);
        let m = agm(&a, &b).unwrap();
        assert_digits(&m, "1.45679103104690686918643238326508");
    }

    #[test]
    fn agm_with_zero() {
        let a = Apfloat::integer_with_precision(1, 20, 10);
        assert!(agm(&a, &Apfloat::zero(10)).unwrap().is_zero());
    }

    #[test]
    fn log_of_two() {
        let x = Apfloat::integer_with_precision(2, 30, 10);
        let l = log(&x).unwrap();
        assert_digits(&l, "0.69314718055994530941723212145");
    }

    #[test]
    fn log_of_ten_uses_radix_cache() {
        let x = Apfloat::integer_with_precision(10, 30, 10);
        let l = log(&x).unwrap();
        assert_digits(&l, "2.3025850929940456840179914546");
    }

    #[test]
    fn log_rejects_nonpositive() {
        assert!(log(&Apfloat::zero(10)).is_err());
        assert!(log(&Apfloat::integer_with_precision(-3, 20, 10)).is_err());
    }

    #[test]
    fn exp_of_one() {
        let x = Apfloat::integer_with_precision(1, 30, 10);
        let e = exp(&x).unwrap();
        assert_digits(&e, "2.7182818284590452353602874713");
    }

    #[test]
    fn exp_log_roundtrip() {
        let x = Apfloat::integer_with_precision(5, 35, 10);
        let roundtrip = exp(&log(&x).unwrap()).unwrap();
        let error = roundtrip.subtract(&x);
        assert!(
            error.is_zero() || error.scale() < 1 - 30,
            "exp(log(5)) error at scale {}",
            error.scale()
        );
    }

    #[test]
    fn log_exp_roundtrip() {
        let x = Apfloat::integer_with_precision(3, 35, 10);
        let roundtrip = log(&exp(&x).unwrap()).unwrap();
        let error = roundtrip.subtract(&x);
        assert!(
            error.is_zero() || error.scale() < 1 - 30,
            "log(exp(3)) error at scale {}",
            error.scale()
        );
    }

    #[test]
    fn log_base_two_of_eight() {
        let x = Apfloat::integer_with_precision(8, 25, 10);
        let b = Apfloat::integer_with_precision(2, 25, 10);
        let l = log_base(&x, &b).unwrap();
        assert_digits(&l, "3.00000000000000000");
    }

    #[test]
    fn exp_overflow_detected() {
        // i64::MAX·ln(10) ≈ 2.1e19; anything above must overflow.
        let huge = Apfloat::from_f64(3e19, 15, 10).with_precision(20);
        assert!(matches!(exp(&huge), Err(ApfloatError::Overflow)));
    }
}
