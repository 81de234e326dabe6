//! The Newton iteration driver: inverse roots and everything built on
//! them (division, square and higher roots, integer powers).
//!
//! Quadratic convergence doubles the working precision every iteration;
//! a final "precising" step at full target precision recovers the
//! half-ulp the doubling schedule would otherwise lose.

use crate::error::{ApfloatError, ApfloatResult};
use crate::value::{Apfloat, EXTRA_PRECISION, INFINITE};

/// `x^n` for integer `n` by binary exponentiation.
pub fn pow(x: &Apfloat, n: i64) -> ApfloatResult<Apfloat> {
    if n == 0 {
        if x.is_zero() {
            return Err(ApfloatError::Arithmetic("zero to the zeroth power"));
        }
        return Ok(Apfloat::one(x.radix()));
    }
    if n < 0 {
        let n = n.checked_neg().ok_or(ApfloatError::Overflow)?;
        return divide(&Apfloat::one(x.radix()), &pow(x, n)?);
    }

    let mut result = x.clone();
    let bits = 63 - n.leading_zeros();
    for bit in (0..bits).rev() {
        result = result.multiply(&result)?;
        if (n >> bit) & 1 == 1 {
            result = result.multiply(x)?;
        }
    }
    Ok(result)
}

/// Inverse `n`-th root `x^{-1/n}` at the argument's precision.
pub fn inverse_root(x: &Apfloat, n: i64) -> ApfloatResult<Apfloat> {
    inverse_root_with(x, n, x.precision(), None, 0)
}

/// Inverse `n`-th root with explicit target precision and an optional
/// initial guess of the given precision.
///
/// This is the basis of the non-elementary operations: division, roots
/// and the π assembly all funnel through here.
pub fn inverse_root_with(
    x: &Apfloat,
    n: i64,
    target_precision: u64,
    initial_guess: Option<&Apfloat>,
    initial_precision: u64,
) -> ApfloatResult<Apfloat> {
    if x.is_zero() {
        return Err(ApfloatError::Arithmetic("inverse root of zero"));
    }
    if n == 0 {
        return Err(ApfloatError::Arithmetic("inverse zeroth root"));
    }
    if n & 1 == 0 && x.signum() < 0 {
        return Err(ApfloatError::Arithmetic(
            "even root of negative number; result would be complex",
        ));
    }
    if target_precision == 0 {
        return Err(ApfloatError::Precision("target precision is not positive"));
    }
    if x.is_one() {
        return Ok(x.with_precision(target_precision));
    }
    if target_precision == INFINITE {
        return Err(ApfloatError::Precision(
            "cannot calculate inverse root to infinite precision",
        ));
    }
    if n == i64::MIN {
        // −n overflows; halve twice.
        let y = inverse_root_with(x, n / -2, target_precision, None, 0)?;
        return inverse_root_with(&y, 2, target_precision, None, 0);
    }
    if n < 0 {
        let y = inverse_root_with(x, -n, target_precision, None, 0)?;
        return inverse_root_with(&y, 1, target_precision, None, 0);
    }

    let radix = x.radix();
    let double_precision = Apfloat::double_precision(radix);
    let one = Apfloat::one(radix);

    let (mut result, mut precision);
    match initial_guess {
        Some(guess) if initial_precision >= double_precision => {
            result = guess.clone();
            precision = initial_precision;
        }
        _ => {
            // Seed from double-precision arithmetic, splitting the scale
            // off first so it cannot overflow the f64 range.
            let scale_quot = x.scale() / n;
            let scale_rem = x.scale() - scale_quot * n;

            let reduced = x.with_precision(double_precision);
            let reduced = reduced.scaled(-reduced.scale());
            #[allow(clippy::cast_precision_loss)]
            let seed = f64::from(x.signum())
                * reduced.to_f64().abs().powf(-1.0 / n as f64)
                * f64::from(radix).powf(-(scale_rem as f64) / n as f64);
            result = Apfloat::from_f64(seed, double_precision, radix).scaled(-scale_quot);
            precision = double_precision;
        }
    }

    let mut iterations: i64 = 0;
    let mut max_precision = precision;
    while max_precision < target_precision {
        max_precision = max_precision.saturating_mul(2);
        iterations += 1;
    }

    // Find where the precising iteration belongs.
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

    let x = x.extended();
    #[allow(clippy::cast_sign_loss)]
    let divisor = n as u64;

    while iterations > 0 {
        iterations -= 1;
        precision = precision.saturating_mul(2);
        result = result.with_precision(precision.min(target_precision));

        let mut t = pow(&result, n)?;
        t = last_iteration_extend(iterations, precising_iteration, &t);
        t = one.subtract(&x.multiply(&t)?);
        if iterations < precising_iteration {
            t = t.with_precision((precision / 2).max(1));
        }

        result = last_iteration_extend(iterations, precising_iteration, &result);
        result = result.add(&result.multiply(&t)?.divide_small(divisor)?);

        if iterations == precising_iteration {
            // One more step at full precision for the lost half-ulp.
            let mut t = pow(&result, n)?;
            t = last_iteration_extend(iterations, -1, &t);
            result = last_iteration_extend(iterations, -1, &result);
            result = result.add(
                &result
                    .multiply(&one.subtract(&x.multiply(&t)?))?
                    .divide_small(divisor)?,
            );
        }
    }

    Ok(result.with_precision(target_precision))
}

fn last_iteration_extend(iterations: i64, precising_iteration: i64, x: &Apfloat) -> Apfloat {
    if iterations == 0 && precising_iteration != 0 {
        x.extended()
    } else {
        x.clone()
    }
}

/// `x / y` via the Newton reciprocal.
pub fn divide(x: &Apfloat, y: &Apfloat) -> ApfloatResult<Apfloat> {
    if y.is_zero() {
        return Err(ApfloatError::Arithmetic("division by zero"));
    }
    if x.is_zero() {
        return Ok(Apfloat::zero(x.radix()));
    }
    let target = x.precision().min(y.precision());
    if y.is_one() {
        return Ok(x.with_precision(target));
    }
    if target == INFINITE {
        return Err(ApfloatError::Precision(
            "cannot divide to infinite precision",
        ));
    }
    x.with_precision(target)
        .multiply(&inverse_root_with(y, 1, target, None, 0)?)
}

/// Square root.
pub fn sqrt(x: &Apfloat) -> ApfloatResult<Apfloat> {
    if x.is_zero() {
        return Ok(Apfloat::zero(x.radix()));
    }
    // x^{1/2} = x · x^{-1/2}
    x.multiply(&inverse_root(x, 2)?)
}

/// Cube root.
pub fn cbrt(x: &Apfloat) -> ApfloatResult<Apfloat> {
    root(x, 3)
}

/// Positive integer `n`-th root.
pub fn root(x: &Apfloat, n: i64) -> ApfloatResult<Apfloat> {
    match n {
        0 => Err(ApfloatError::Arithmetic("zeroth root")),
        1 => Ok(x.clone()),
        2 => sqrt(x),
        _ if n < 0 => {
            let y = root(x, n.checked_neg().ok_or(ApfloatError::Overflow)?)?;
            divide(&Apfloat::one(x.radix()), &y)
        }
        _ => {
            if x.is_zero() {
                return Ok(Apfloat::zero(x.radix()));
            }
            // x^{1/n} = x · (x^{n−1})^{-1/n}
            x.multiply(&inverse_root(&pow(x, n - 1)?.with_precision(x.precision()), n)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_digits(value: &Apfloat, expected: &str) {
        let printed = value.to_string();
        let check_len = printed.len().min(expected.len());
        assert_eq!(
            &printed[..check_len],
            &expected[..check_len],
            "full output: {printed}"
        );
    }

    #[test]
    fn reciprocal_of_three() {
        let x = Apfloat::integer_with_precision(3, 40, 10);
        let r = inverse_root(&x, 1).unwrap();
        assert_digits(&r, "0.33333333333333333333333333333333");
    }

    #[test]
    fn divide_exact_values() {
        let x = Apfloat::integer_with_precision(355, 30, 10);
        let y = Apfloat::integer_with_precision(113, 30, 10);
        let q = divide(&x, &y).unwrap();
        assert_digits(&q, "3.14159292035398230088495575");
    }

    #[test]
    fn sqrt_of_two() {
        let x = Apfloat::integer_with_precision(2, 40, 10);
        let s = sqrt(&x).unwrap();
        assert_digits(&s, "1.41421356237309504880168872420969");
    }

    #[test]
    fn sqrt_squares_back() {
        let x = Apfloat::integer_with_precision(7, 50, 10);
        let s = sqrt(&x).unwrap();
        let square = s.multiply(&s).unwrap();
        let difference = square.subtract(&x);
        assert!(
            difference.is_zero() || difference.scale() < 1 - 45,
            "sqrt(7)^2 error at scale {}",
            difference.scale()
        );
    }

    #[test]
    fn cube_root() {
        let x = Apfloat::integer_with_precision(27, 30, 10);
        let c = cbrt(&x).unwrap();
        assert_digits(&c, "3.0000000000000000000000");
    }

    #[test]
    fn integer_pow() {
        let x = Apfloat::integer(3, 10);
        assert_eq!(pow(&x, 5).unwrap().to_string(), "243");
        assert!(pow(&Apfloat::zero(10), 0).is_err());
        assert!(pow(&x, 0).unwrap().is_one());
    }

    #[test]
    fn error_cases() {
        let x = Apfloat::integer_with_precision(2, 20, 10);
        assert!(matches!(
            inverse_root(&Apfloat::zero(10), 2),
            Err(ApfloatError::Arithmetic(_))
        ));
        assert!(matches!(
            inverse_root(&x, 0),
            Err(ApfloatError::Arithmetic(_))
        ));
        assert!(matches!(
            inverse_root(&Apfloat::integer_with_precision(-2, 20, 10), 2),
            Err(ApfloatError::Arithmetic(_))
        ));
        assert!(matches!(
            inverse_root(&Apfloat::integer(2, 10), 2),
            Err(ApfloatError::Precision(_))
        ));
        assert!(matches!(
            divide(&x, &Apfloat::zero(10)),
            Err(ApfloatError::Arithmetic(_))
        ));
    }

    #[test]
    fn quadratic_convergence() {
        // Each Newton iteration should double the number of correct
        // digits: a target needing k doublings from the 15-digit seed
        // must come out fully correct.
        let reference = concat!(
            "0.577350269189625764509148780501",
            "9574556476017512701268760186023264"
        );
        for target in [30u64, 60, 120, 240] {
            let x = Apfloat::integer_with_precision(3, target, 10);
            let r = inverse_root(&x, 2).unwrap();
            let printed = r.to_string();
            let check = printed.len().min(reference.len()).min(target as usize + 1);
            assert_eq!(
                &printed[..check],
                &reference[..check],
                "target {target}: {printed}"
            );
        }
    }
}
