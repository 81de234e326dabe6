//! String conversion: parsing and display with round-to-nearest of the
//! last retained digit (the only rounding mode).

use mpfloat_storage::Element as _;

use crate::error::{ApfloatError, ApfloatResult};
use crate::value::{base_info, Apfloat, Digit, INFINITE};

impl Apfloat {
    /// Parse a number in the given radix with the given precision.
    ///
    /// Accepts an optional sign, radix digits, and an optional radix
    /// point: `"-123.456"`, `"0.00123"`, `"ff.8"` (radix 16).
    pub fn parse(input: &str, precision: u64, radix: u32) -> ApfloatResult<Self> {
        Self::check_radix(radix)?;
        assert!(precision > 0, "precision must be positive");

        let err = || ApfloatError::Parse {
            input: input.to_string(),
            radix,
        };

        let (sign, body) = match input.as_bytes().first() {
            Some(b'-') => (-1i8, &input[1..]),
            Some(b'+') => (1i8, &input[1..]),
            _ => (1i8, input),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }

        let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
        for c in int_part.chars().chain(frac_part.chars()) {
            digits.push(c.to_digit(radix).ok_or_else(err)?);
        }

        // Position of the first significant digit fixes the scale.
        let Some(first) = digits.iter().position(|&d| d != 0) else {
            return Ok(Self::zero(radix));
        };
        #[allow(clippy::cast_possible_wrap)]
        let scale = int_part.len() as i64 - first as i64;
        let significant = &digits[first..];

        Ok(Self::from_radix_digits(
            sign,
            scale,
            significant,
            precision,
            radix,
        ))
    }

    /// Build a value from loose radix digits, most significant first,
    /// with the radix point after `scale` digits.
    pub(crate) fn from_radix_digits(
        sign: i8,
        scale: i64,
        digits: &[u32],
        precision: u64,
        radix: u32,
    ) -> Self {
        let (_, bd) = base_info(radix);
        let bd = i64::from(bd);

        // Left-pad so the radix point lands on an element boundary.
        let exponent = scale.div_euclid(bd) + i64::from(scale.rem_euclid(bd) != 0);
        #[allow(clippy::cast_sign_loss)]
        let pad = (exponent * bd - scale) as usize;

        let total = pad + digits.len();
        #[allow(clippy::cast_sign_loss)]
        let elements = total.div_ceil(bd as usize);
        let mut mantissa = Vec::with_capacity(elements);
        let mut position = 0usize;
        for _ in 0..elements {
            let mut element = 0u64;
            for _ in 0..bd {
                let d = if position < pad {
                    0
                } else {
                    digits.get(position - pad).copied().unwrap_or(0)
                };
                element = element * u64::from(radix) + u64::from(d);
                position += 1;
            }
            mantissa.push(Digit::from_u64(element));
        }

        Self::from_parts(sign, exponent, mantissa, precision, radix)
    }

    /// The mantissa as loose radix digits, most significant first.
    pub(crate) fn radix_digits(&self) -> Vec<u32> {
        let (_, bd) = base_info(self.radix);
        let radix = u64::from(self.radix);
        let mantissa = self.mantissa();
        let mut digits = Vec::with_capacity(mantissa.len() * bd as usize);
        for (i, element) in mantissa.iter().enumerate() {
            let mut chunk = [0u32; 64];
            let mut v = element.to_u64();
            for slot in chunk[..bd as usize].iter_mut().rev() {
                #[allow(clippy::cast_possible_truncation)]
                {
                    *slot = (v % radix) as u32;
                }
                v /= radix;
            }
            if i == 0 {
                // The leading element is printed without left padding.
                let lead = crate::value::digits_in(element.to_u64(), self.radix) as usize;
                digits.extend_from_slice(&chunk[bd as usize - lead..bd as usize]);
            } else {
                digits.extend_from_slice(&chunk[..bd as usize]);
            }
        }
        digits
    }

    /// Format to at most `max_digits` significant digits, rounding the
    /// last retained digit to nearest (ties away from zero).
    fn format_digits(&self, max_digits: u64) -> String {
        if self.is_zero() {
            return "0".to_string();
        }

        let mut digits = self.radix_digits();
        let mut scale = self.scale();

        #[allow(clippy::cast_possible_truncation)]
        let keep = (max_digits.min(digits.len() as u64)) as usize;
        if keep < digits.len() {
            let round_up = u64::from(digits[keep]) * 2 >= u64::from(self.radix);
            digits.truncate(keep);
            if round_up {
                let mut i = keep;
                loop {
                    if i == 0 {
                        digits.insert(0, 1);
                        digits.pop();
                        scale += 1;
                        break;
                    }
                    i -= 1;
                    if digits[i] + 1 < self.radix {
                        digits[i] += 1;
                        break;
                    }
                    digits[i] = 0;
                }
            }
        }

        let digit_char = |d: u32| char::from_digit(d, self.radix).expect("digit in radix");
        let mut out = String::new();
        if self.sign < 0 {
            out.push('-');
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        if scale <= 0 {
            out.push_str("0.");
            for _ in 0..(-scale) {
                out.push('0');
            }
            for &d in &digits {
                out.push(digit_char(d));
            }
        } else if (scale as usize) >= digits.len() {
            for &d in &digits {
                out.push(digit_char(d));
            }
            for _ in 0..(scale as usize - digits.len()) {
                out.push('0');
            }
        } else {
            for (i, &d) in digits.iter().enumerate() {
                if i == scale as usize {
                    out.push('.');
                }
                out.push(digit_char(d));
            }
        }

        // Stored mantissas are element-aligned, so exact values can carry
        // trailing fraction zeros; trim them from the printed form.
        if out.contains('.') {
            let trimmed = out.trim_end_matches('0').trim_end_matches('.');
            out.truncate(trimmed.len());
        }
        out
    }
}

impl std::fmt::Display for Apfloat {
    /// Prints at most `precision` significant digits (everything stored
    /// for exact values), rounding the last digit to nearest.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let limit = if self.precision == INFINITE {
            u64::MAX
        } else {
            self.precision
        };
        f.write_str(&self.format_digits(limit))
    }
}

impl std::fmt::Debug for Apfloat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Apfloat({}, precision {}, radix {})",
            self,
            if self.precision == INFINITE {
                "∞".to_string()
            } else {
                self.precision.to_string()
            },
            self.radix
        )
    }
}
