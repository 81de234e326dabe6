//! Elementary arithmetic: addition, subtraction, multiplication through
//! the convolution engine, short division, and radix-digit scaling.

use mpfloat_storage::Element as _;

use crate::error::{ApfloatError, ApfloatResult};
use crate::value::{base_info, Apfloat, Digit, INFINITE};

/// Precision of a sum: the absolute error of each operand is
/// `radix^(scale − precision)`; the result keeps digits down to the
/// larger error.
fn sum_precision(x: &Apfloat, y: &Apfloat, result_scale: i64) -> u64 {
    let err = |v: &Apfloat| -> i128 {
        if v.is_zero() || v.precision() == INFINITE {
            i128::MIN / 2
        } else {
            i128::from(v.scale()) - i128::from(v.precision())
        }
    };
    let worst = err(x).max(err(y));
    if worst <= i128::MIN / 2 {
        return INFINITE;
    }
    let digits = i128::from(result_scale) - worst;
    digits.clamp(1, i128::from(INFINITE - 1)) as u64
}

impl Apfloat {
    /// `self + other`.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        debug_assert_eq!(self.radix, other.radix);
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }

        let result = if self.sign == other.sign {
            let (digits, exponent) = magnitude_add(self, other);
            Self::from_parts(self.sign, exponent, digits, INFINITE, self.radix)
        } else {
            match self.compare_abs(other) {
                std::cmp::Ordering::Equal => return Self::zero(self.radix),
                std::cmp::Ordering::Greater => {
                    let (digits, exponent) = magnitude_subtract(self, other);
                    Self::from_parts(self.sign, exponent, digits, INFINITE, self.radix)
                }
                std::cmp::Ordering::Less => {
                    let (digits, exponent) = magnitude_subtract(other, self);
                    Self::from_parts(other.sign, exponent, digits, INFINITE, self.radix)
                }
            }
        };
        if result.is_zero() {
            return result;
        }
        let precision = sum_precision(self, other, result.scale());
        result.with_precision(precision)
    }

    /// `self − other`.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        self.add(&other.negate())
    }

    /// `self · other` through the convolution engine.
    pub fn multiply(&self, other: &Self) -> ApfloatResult<Self> {
        debug_assert_eq!(self.radix, other.radix);
        if self.is_zero() || other.is_zero() {
            return Ok(Self::zero(self.radix));
        }

        let (_, bd) = base_info(self.radix);
        let precision = self.precision.min(other.precision);
        let full = self.len() + other.len();
        let result_size = if precision == INFINITE {
            full
        } else {
            full.min(precision.div_ceil(u64::from(bd)) + 3)
        };

        let product = mpfloat_ntt::multiply(
            &self.data,
            self.len(),
            &other.data,
            other.len(),
            result_size,
            self.radix,
        )?;

        Self::from_storage(
            self.sign * other.sign,
            self.exponent + other.exponent,
            product,
            precision,
            self.radix,
        )
    }

    /// Exact division by a small positive integer (used by the Newton
    /// update and the AGM, never by user-facing division).
    pub(crate) fn divide_small(&self, divisor: u64) -> ApfloatResult<Self> {
        if divisor == 0 {
            return Err(ApfloatError::Arithmetic("division by zero"));
        }
        assert!(divisor < 1 << 32, "short division divisor too large");
        if self.is_zero() || divisor == 1 {
            return Ok(self.clone());
        }

        let (base, bd) = base_info(self.radix);
        let digits = self.mantissa();
        let needed = if self.precision == INFINITE {
            // Exact values must divide exactly; allow some expansion room.
            digits.len() as u64 + 64
        } else {
            self.precision.div_ceil(u64::from(bd)) + 3
        };

        let mut out = Vec::with_capacity(needed as usize + 1);
        let mut remainder = 0u128;
        let mut index = 0u64;
        while (index as usize) < digits.len() || (remainder != 0 && index < needed + 1) {
            let d = if (index as usize) < digits.len() {
                digits[index as usize].to_u64()
            } else {
                0
            };
            let cur = remainder * u128::from(base) + u128::from(d);
            out.push(Digit::from_u128(cur / u128::from(divisor)));
            remainder = cur % u128::from(divisor);
            index += 1;
        }
        if self.precision == INFINITE && remainder != 0 {
            return Err(ApfloatError::Precision(
                "inexact division of an exact value",
            ));
        }

        Ok(Self::from_parts(
            self.sign,
            self.exponent,
            out,
            self.precision,
            self.radix,
        ))
    }

    /// `self · radix^s`: element shifts plus, for the sub-element part,
    /// one exact scalar multiply of the mantissa.
    #[must_use]
    pub fn scaled(&self, s: i64) -> Self {
        if self.is_zero() || s == 0 {
            return self.clone();
        }
        let (base, bd) = base_info(self.radix);
        let bd = i64::from(bd);
        let element_shift = s.div_euclid(bd);
        let digit_shift = s.rem_euclid(bd);

        let mut exponent = self.exponent + element_shift;
        if digit_shift == 0 {
            let mut result = self.clone();
            result.exponent = exponent;
            return result;
        }

        #[allow(clippy::cast_sign_loss)]
        let factor = u128::from(u64::from(self.radix)).pow(digit_shift as u32);
        let mut digits = self.mantissa();
        let mut carry = 0u128;
        for d in digits.iter_mut().rev() {
            let wide = d.to_u128() * factor + carry;
            *d = Digit::from_u128(wide % u128::from(base));
            carry = wide / u128::from(base);
        }
        if carry > 0 {
            digits.insert(0, Digit::from_u128(carry));
            exponent += 1;
        }
        Self::from_parts(self.sign, exponent, digits, self.precision, self.radix)
    }
}

/// Add the magnitudes of two same-radix values, returning the digit
/// vector and the element exponent of the result.
fn magnitude_add(x: &Apfloat, y: &Apfloat) -> (Vec<Digit>, i64) {
    let (base, bd) = base_info(x.radix());
    let e = x.exponent.max(y.exponent);
    #[allow(clippy::cast_sign_loss)]
    let off_x = (e - x.exponent) as u64;
    #[allow(clippy::cast_sign_loss)]
    let off_y = (e - y.exponent) as u64;
    let mut len = (off_x + x.len()).max(off_y + y.len());

    // With both precisions finite, digits far below the result precision
    // cannot survive; cap the tail.
    if x.precision() != INFINITE && y.precision() != INFINITE {
        let useful = x.precision().max(y.precision());
        len = len.min(useful.div_ceil(u64::from(bd)) + 3);
    }

    let at = |v: &Apfloat, off: u64, i: u64| -> u64 {
        if i >= off {
            v.element(i - off).to_u64()
        } else {
            0
        }
    };

    let mut digits = vec![Digit::ZERO; len as usize];
    let mut carry = 0u64;
    for i in (0..len).rev() {
        let sum = at(x, off_x, i) + at(y, off_y, i) + carry;
        digits[i as usize] = Digit::from_u64(sum % base);
        carry = sum / base;
    }
    if carry > 0 {
        digits.insert(0, Digit::from_u64(carry));
        return (digits, e + 1);
    }
    (digits, e)
}

/// Subtract the magnitude of `y` from the strictly larger `x`.
fn magnitude_subtract(x: &Apfloat, y: &Apfloat) -> (Vec<Digit>, i64) {
    let (base, bd) = base_info(x.radix());
    let e = x.exponent.max(y.exponent);
    #[allow(clippy::cast_sign_loss)]
    let off_x = (e - x.exponent) as u64;
    #[allow(clippy::cast_sign_loss)]
    let off_y = (e - y.exponent) as u64;
    let mut len = (off_x + x.len()).max(off_y + y.len());

    if x.precision() != INFINITE && y.precision() != INFINITE {
        let useful = x.precision().max(y.precision());
        len = len.min(useful.div_ceil(u64::from(bd)) + 3);
    }

    let at = |v: &Apfloat, off: u64, i: u64| -> u64 {
        if i >= off {
            v.element(i - off).to_u64()
        } else {
            0
        }
    };

    let mut digits = vec![Digit::ZERO; len as usize];
    let mut borrow = 0u64;
    for i in (0..len).rev() {
        let a = at(x, off_x, i);
        let b = at(y, off_y, i) + borrow;
        if a >= b {
            digits[i as usize] = Digit::from_u64(a - b);
            borrow = 0;
        } else {
            digits[i as usize] = Digit::from_u64(a + base - b);
            borrow = 1;
        }
    }
    debug_assert_eq!(borrow, 0, "magnitude subtraction underflow");
    (digits, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Apfloat {
        Apfloat::integer(v, 10)
    }

    fn as_i64(x: &Apfloat) -> i64 {
        #[allow(clippy::cast_possible_truncation)]
        let v = x.to_f64().round() as i64;
        v
    }

    #[test]
    fn add_small_integers() {
        assert_eq!(as_i64(&int(123).add(&int(456))), 579);
        assert_eq!(as_i64(&int(999).add(&int(1))), 1000);
        assert_eq!(as_i64(&int(-5).add(&int(3))), -2);
        assert!(int(5).add(&int(-5)).is_zero());
    }

    #[test]
    fn subtract_with_cancellation() {
        let a = int(1_000_000);
        let b = int(999_999);
        let diff = a.subtract(&b);
        assert_eq!(as_i64(&diff), 1);
        assert_eq!(diff.scale(), 1);
    }

    #[test]
    fn add_carry_across_elements() {
        let (base, _) = base_info(10);
        #[allow(clippy::cast_possible_wrap)]
        let almost = int(base as i64 - 1);
        let sum = almost.add(&int(1));
        assert_eq!(sum.scale(), almost.scale() + 1);
    }

    #[test]
    fn multiply_exact_integers() {
        let product = int(12_345).multiply(&int(6_789)).unwrap();
        assert_eq!(as_i64(&product), 83_810_205);
        assert_eq!(product.precision(), INFINITE);

        let signed = int(-12).multiply(&int(12)).unwrap();
        assert_eq!(as_i64(&signed), -144);
    }

    #[test]
    fn multiply_zero() {
        assert!(int(0).multiply(&int(55)).unwrap().is_zero());
    }

    #[test]
    fn divide_small_exact() {
        let x = int(1_000_000);
        assert_eq!(as_i64(&x.divide_small(8).unwrap()), 125_000);

        // 1/2 at finite precision
        let half = Apfloat::one(10).with_precision(30).divide_small(2).unwrap();
        assert_eq!(half.scale(), 0);
        assert!((half.to_f64() - 0.5).abs() < 1e-15);

        // Exact value, inexact division
        assert!(Apfloat::one(10).divide_small(3).is_err());
    }

    #[test]
    fn scaled_by_radix_digits() {
        let x = int(7);
        assert_eq!(x.scaled(3).scale(), 4);
        assert_eq!(as_i64(&x.scaled(3)), 7000);
        let down = x.scaled(-2);
        assert_eq!(down.scale(), -1);
        assert!((down.to_f64() - 0.07).abs() < 1e-15);
        // Element-aligned shift
        let (_, bd) = base_info(10);
        assert_eq!(x.scaled(i64::from(bd)).scale(), 1 + i64::from(bd));
    }

    #[test]
    fn sum_precision_tracks_cancellation() {
        let a = Apfloat::integer_with_precision(1_000_001, 10, 10);
        let b = Apfloat::integer_with_precision(-1_000_000, 10, 10);
        let diff = a.add(&b);
        // Six leading digits cancelled: precision drops accordingly.
        assert_eq!(as_i64(&diff), 1);
        assert!(diff.precision() <= 10);
    }
}
