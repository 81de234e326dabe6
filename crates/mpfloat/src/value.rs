//! The arbitrary-precision floating-point value.
//!
//! A value is `sign · 0.d₀d₁…d_{k−1} · B^exponent` where the dᵢ are
//! base-`B` elements (`B = radix^digits_per_element`), most significant
//! first with `d₀ ≠ 0`. Keeping the mantissa element-aligned means
//! addition and multiplication never shift within an element; only
//! radix-digit scaling by a non-multiple of the element width touches
//! digit boundaries.
//!
//! Precision is tracked in radix digits. [`INFINITE`] marks exact
//! values (integers built by the binary-splitting series); operations
//! on them keep every digit.

use mpfloat_storage::{AccessMode, DataStorage};

use crate::error::{ApfloatError, ApfloatResult};

/// The digit element width, chosen at configuration time via the
/// `digit-*` cargo features. Defaults to 64-bit elements.
#[cfg(feature = "digit-u8")]
pub type Digit = u8;
#[cfg(all(feature = "digit-u16", not(feature = "digit-u8")))]
pub type Digit = u16;
#[cfg(all(
    feature = "digit-u32",
    not(any(feature = "digit-u8", feature = "digit-u16"))
))]
pub type Digit = u32;
#[cfg(not(any(feature = "digit-u8", feature = "digit-u16", feature = "digit-u32")))]
pub type Digit = u64;

/// Marker precision for exact values.
pub const INFINITE: u64 = u64::MAX;

/// Extra working digits carried through intermediate computations to
/// absorb accumulated round-off.
pub(crate) const EXTRA_PRECISION: u64 = 20;

/// An arbitrary-precision floating-point number.
#[derive(Clone)]
pub struct Apfloat {
    pub(crate) sign: i8,
    pub(crate) exponent: i64,
    pub(crate) precision: u64,
    pub(crate) radix: u32,
    pub(crate) data: DataStorage<Digit>,
}

/// Number of radix digits in a nonzero element value.
pub(crate) fn digits_in(value: u64, radix: u32) -> u32 {
    let radix = u64::from(radix);
    let mut digits = 1;
    let mut v = value / radix;
    while v > 0 {
        digits += 1;
        v /= radix;
    }
    digits
}

/// The element base and digits-per-element for a radix.
pub(crate) fn base_info(radix: u32) -> (u64, u32) {
    mpfloat_ntt::base_for_radix::<Digit>(radix).expect("radix validated at construction")
}

impl Apfloat {
    /// The zero value.
    #[must_use]
    pub fn zero(radix: u32) -> Self {
        Self {
            sign: 0,
            exponent: 0,
            precision: INFINITE,
            radix,
            data: DataStorage::memory(0),
        }
    }

    /// The exact value one.
    #[must_use]
    pub fn one(radix: u32) -> Self {
        Self::integer(1, radix)
    }

    /// An exact integer value.
    #[must_use]
    pub fn integer(value: i64, radix: u32) -> Self {
        Self::integer_with_precision(value, INFINITE, radix)
    }

    /// An integer value with explicit precision.
    #[must_use]
    pub fn integer_with_precision(value: i64, precision: u64, radix: u32) -> Self {
        let (base, _) = base_info(radix);
        let sign = match value.cmp(&0) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => return Self::zero(radix),
            std::cmp::Ordering::Greater => 1,
        };
        let mut magnitude = value.unsigned_abs();
        let mut digits = Vec::new();
        while magnitude > 0 {
            digits.push(Digit::from_u64(magnitude % base));
            magnitude /= base;
        }
        digits.reverse();
        #[allow(clippy::cast_possible_wrap)]
        let exponent = digits.len() as i64;
        Self::from_parts(sign, exponent, digits, precision, radix)
    }

    /// Assemble a value from raw parts, normalizing leading and trailing
    /// zero elements.
    #[must_use]
    pub(crate) fn from_parts(
        sign: i8,
        mut exponent: i64,
        mut digits: Vec<Digit>,
        precision: u64,
        radix: u32,
    ) -> Self {
        let mut start = 0;
        while start < digits.len() && digits[start] == 0 {
            start += 1;
            exponent -= 1;
        }
        digits.drain(..start);
        while digits.last() == Some(&0) {
            digits.pop();
        }
        if sign == 0 || digits.is_empty() {
            return Self::zero(radix);
        }

        let data = DataStorage::memory(digits.len() as u64);
        {
            let mut it = data
                .iterator(AccessMode::Write, 0, digits.len() as u64)
                .expect("fresh storage");
            for &d in &digits {
                it.set(d);
                it.next().expect("in-memory iteration");
            }
        }
        Self {
            sign,
            exponent,
            precision,
            radix,
            data,
        }
    }

    /// Assemble from a storage produced by the convolution pipeline.
    /// Only the (at most one) leading zero element is stripped; the
    /// storage is shared, not copied.
    pub(crate) fn from_storage(
        sign: i8,
        mut exponent: i64,
        data: DataStorage<Digit>,
        precision: u64,
        radix: u32,
    ) -> ApfloatResult<Self> {
        let mut data = data;
        while data.size() > 0 && data.get(0)? == 0 {
            data = data.subsequence(1, data.size() - 1)?;
            exponent -= 1;
        }
        if sign == 0 || data.size() == 0 {
            return Ok(Self::zero(radix));
        }
        Ok(Self {
            sign,
            exponent,
            precision,
            radix,
            data,
        })
    }

    /// Number of mantissa elements.
    #[must_use]
    pub(crate) fn len(&self) -> u64 {
        self.data.size()
    }

    /// The element at `index`, with an implicit zero tail.
    pub(crate) fn element(&self, index: u64) -> Digit {
        if index < self.data.size() {
            self.data.get(index).expect("element in range")
        } else {
            0
        }
    }

    /// Read the full mantissa into a vector.
    pub(crate) fn mantissa(&self) -> Vec<Digit> {
        let n = self.data.size();
        let mut out = Vec::with_capacity(n as usize);
        if n > 0 {
            let mut it = self
                .data
                .iterator(AccessMode::Read, 0, n)
                .expect("mantissa read");
            for _ in 0..n {
                out.push(it.get());
                it.next().expect("mantissa read");
            }
        }
        out
    }

    /// The sign: −1, 0 or 1.
    #[must_use]
    pub fn signum(&self) -> i32 {
        i32::from(self.sign)
    }

    /// The radix of the representation.
    #[must_use]
    pub fn radix(&self) -> u32 {
        self.radix
    }

    /// The precision in radix digits ([`INFINITE`] for exact values).
    #[must_use]
    pub fn precision(&self) -> u64 {
        self.precision
    }

    /// The same value with a new declared precision.
    #[must_use]
    pub fn with_precision(&self, precision: u64) -> Self {
        assert!(precision > 0, "precision must be positive");
        let mut result = self.clone();
        result.precision = precision;
        result
    }

    /// The same value with at least `precision` declared digits.
    #[must_use]
    pub fn ensure_precision(&self, precision: u64) -> Self {
        if self.precision < precision {
            self.with_precision(precision)
        } else {
            self.clone()
        }
    }

    /// The same value with [`EXTRA_PRECISION`] more digits.
    #[must_use]
    pub(crate) fn extended(&self) -> Self {
        if self.precision == INFINITE {
            self.clone()
        } else {
            self.with_precision(self.precision + EXTRA_PRECISION)
        }
    }

    /// The scale: the radix-digit exponent of the leading digit plus
    /// one, i.e. `x = m·radix^scale` with `1/radix <= |m| < 1`.
    /// Zero has scale 0 by convention.
    #[must_use]
    pub fn scale(&self) -> i64 {
        if self.sign == 0 {
            return 0;
        }
        let (_, bd) = base_info(self.radix);
        (self.exponent - 1) * i64::from(bd)
            + i64::from(digits_in(self.element(0).to_u64(), self.radix))
    }

    /// The negated value.
    #[must_use]
    pub fn negate(&self) -> Self {
        let mut result = self.clone();
        result.sign = -result.sign;
        result
    }

    /// The absolute value.
    #[must_use]
    pub fn abs(&self) -> Self {
        let mut result = self.clone();
        result.sign = result.sign.abs();
        result
    }

    /// Whether this value is exactly one.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.sign == 1 && self.exponent == 1 && self.len() == 1 && self.element(0) == 1
    }

    /// Whether this value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.sign == 0
    }

    /// Compare magnitudes.
    #[must_use]
    pub fn compare_abs(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        debug_assert_eq!(self.radix, other.radix);
        match (self.sign == 0, other.sign == 0) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        match self.scale().cmp(&other.scale()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        // Equal scales imply equal exponents; compare element-wise.
        let n = self.len().max(other.len());
        for i in 0..n {
            match self.element(i).cmp(&other.element(i)) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }

    /// Signed comparison.
    #[must_use]
    pub fn compare(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match self.sign.cmp(&other.sign) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        let magnitude = self.compare_abs(other);
        if self.sign < 0 {
            magnitude.reverse()
        } else {
            magnitude
        }
    }

    /// Approximate count of equal leading radix digits of two values.
    /// Used for convergence detection; accurate to within an element.
    #[must_use]
    pub fn equal_digits(&self, other: &Self) -> u64 {
        if self.sign != other.sign || self.sign == 0 || self.scale() != other.scale() {
            return 0;
        }
        let (_, bd) = base_info(self.radix);
        let lead = u64::from(digits_in(self.element(0).to_u64(), self.radix));
        let n = self.len().max(other.len());
        for i in 0..n {
            let (a, b) = (self.element(i).to_u64(), other.element(i).to_u64());
            if a != b {
                let diff = a.abs_diff(b);
                let matched_in_element =
                    u64::from(bd).saturating_sub(u64::from(digits_in(diff, self.radix)));
                let whole = if i == 0 {
                    0
                } else {
                    lead + (i - 1) * u64::from(bd)
                };
                let in_element = if i == 0 {
                    lead.saturating_sub(u64::from(digits_in(diff, self.radix)))
                } else {
                    matched_in_element
                };
                return whole + in_element;
            }
        }
        lead + (n - 1) * u64::from(bd)
    }

    /// Approximate conversion to `f64` (seed extraction).
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        if self.sign == 0 {
            return 0.0;
        }
        let (base, _) = base_info(self.radix);
        let base_f = base as f64;
        let mut mantissa = 0.0f64;
        let take = self.len().min(2);
        for i in 0..take {
            mantissa = mantissa * base_f + self.element(i).to_u64() as f64;
        }
        mantissa /= base_f.powi(take as i32);
        let magnitude = mantissa * pow_saturating(base_f, self.exponent);
        f64::from(self.sign) * magnitude
    }

    /// Build a value from an `f64` seed with the given precision.
    #[must_use]
    pub fn from_f64(value: f64, precision: u64, radix: u32) -> Self {
        if value == 0.0 || !value.is_finite() {
            return Self::zero(radix);
        }
        let (base, _) = base_info(radix);
        let base_f = base as f64;
        let sign: i8 = if value < 0.0 { -1 } else { 1 };
        let mut magnitude = value.abs();
        let mut exponent = 0i64;
        while magnitude >= 1.0 {
            magnitude /= base_f;
            exponent += 1;
        }
        while magnitude < 1.0 / base_f {
            magnitude *= base_f;
            exponent -= 1;
        }
        // Two elements capture more than an f64 mantissa's worth.
        let mut digits = Vec::with_capacity(2);
        for _ in 0..2 {
            magnitude *= base_f;
            let digit = magnitude.floor();
            magnitude -= digit;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            digits.push(Digit::from_u64(digit as u64));
        }
        Self::from_parts(sign, exponent, digits, precision, radix)
    }

    /// Number of radix digits an `f64` seed carries.
    #[must_use]
    pub fn double_precision(radix: u32) -> u64 {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        {
            (52.0 / f64::from(radix).log2()).floor() as u64
        }
    }

    /// The backing digit storage.
    #[must_use]
    pub fn storage(&self) -> &DataStorage<Digit> {
        &self.data
    }

    /// Validate a radix for public constructors.
    pub(crate) fn check_radix(radix: u32) -> ApfloatResult<()> {
        if (2..=36).contains(&radix) {
            Ok(())
        } else {
            Err(ApfloatError::Ntt(mpfloat_ntt::NttError::InvalidRadix(radix)))
        }
    }
}

fn pow_saturating(base: f64, exponent: i64) -> f64 {
    let e = exponent.clamp(i64::from(i32::MIN), i64::from(i32::MAX));
    #[allow(clippy::cast_possible_truncation)]
    base.powi(e as i32)
}

use mpfloat_storage::Element as _;
