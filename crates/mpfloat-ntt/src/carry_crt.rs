//! Carry-CRT finalization of a three-modulus convolution.
//!
//! Each element of the three residue sets is recombined by the Chinese
//! Remainder Theorem into its value modulo `p0·p1·p2`, and a single
//! carry pass converts the coefficient stream into digits of the target
//! base. The pass walks from the least significant element (highest
//! index) upward; each step emits `acc mod base` and keeps `acc / base`
//! as the running carry, held in three full words of CRT arithmetic.
//!
//! The parallel mode splits the pass into blocks computed independently,
//! then a strictly ordered finishing phase threads the two leftover
//! carry digits of each block into the next through a one-shot message
//! passer.

use std::any::Any;
use std::sync::OnceLock;

use mpfloat_storage::{AccessMode, Context, DataStorage};
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};
use parking_lot::Mutex;

use crate::element::{base_for_radix, NttElement};
use crate::error::NttResult;
use crate::modmath::ModMath;
use crate::parallel::{run_blocks, MessagePasser};

/// Constants for one (prime triple, element width) pair.
///
/// `t[k] = (∏ other primes)⁻¹ mod p_k`; the `m` products are stored as
/// full base-`2^width` words, most significant first.
#[derive(Debug, Clone)]
struct CrtConstants<E> {
    t: [E; 3],
    m01: [E; 2],
    m02: [E; 2],
    m12: [E; 2],
    m012: [E; 3],
}

fn compute_constants<E: NttElement>() -> CrtConstants<E> {
    let p: Vec<BigUint> = E::MODULUS.iter().map(|m| BigUint::from(m.to_u64())).collect();
    let m01 = &p[0] * &p[1];
    let m02 = &p[0] * &p[2];
    let m12 = &p[1] * &p[2];
    let m012 = &m01 * &p[2];

    // Modular inverses via Fermat: the moduli are prime.
    let inv = |value: &BigUint, modulus: &BigUint| -> BigUint {
        value.modpow(&(modulus - 2u32), modulus)
    };

    let to_word = |v: &BigUint| E::from_u64(v.to_u64().expect("word fits element"));
    let words = |v: &BigUint, count: usize| -> Vec<E> {
        let mask = (BigUint::one() << E::BITS) - 1u32;
        (0..count)
            .rev()
            .map(|i| to_word(&((v >> (E::BITS * i as u32)) & &mask)))
            .collect()
    };

    let w2 = |v: &BigUint| -> [E; 2] { words(v, 2).try_into().unwrap() };

    tracing::debug!(width = E::BITS, "computed carry-CRT constants");
    CrtConstants {
        t: [
            to_word(&inv(&m12, &p[0])),
            to_word(&inv(&m02, &p[1])),
            to_word(&inv(&m01, &p[2])),
        ],
        m01: w2(&m01),
        m02: w2(&m02),
        m12: w2(&m12),
        m012: words(&m012, 3).try_into().unwrap(),
    }
}

/// The constants for one element width, computed on first use and held
/// for the process lifetime. Every width has its own cell, so repeated
/// multiplications never redo the modular inversions.
fn cached_constants<E: NttElement>() -> &'static CrtConstants<E> {
    macro_rules! width_cell {
        ($t:ty, $cell:ident) => {{
            static $cell: OnceLock<CrtConstants<$t>> = OnceLock::new();
            ($cell.get_or_init(compute_constants::<$t>) as &dyn Any)
                .downcast_ref::<CrtConstants<E>>()
                .expect("element width dispatch")
        }};
    }
    match E::BITS {
        8 => width_cell!(u8, CONSTANTS_U8),
        16 => width_cell!(u16, CONSTANTS_U16),
        32 => width_cell!(u32, CONSTANTS_U32),
        64 => width_cell!(u64, CONSTANTS_U64),
        _ => unreachable!("unsupported element width"),
    }
}

/// Three-word arithmetic in base `2^width`, plus division by the digit
/// base. Words are stored most significant first.
#[derive(Debug, Clone, Copy)]
struct CrtMath {
    base: u64,
}

impl CrtMath {
    fn mask<E: NttElement>() -> u128 {
        (1u128 << E::BITS) - 1
    }

    /// `dst += src`, returning true on carry out of the top word.
    fn add<E: NttElement>(src: &[E; 3], dst: &mut [E; 3]) -> bool {
        let mut carry = 0u128;
        for i in (0..3).rev() {
            let sum = dst[i].to_u128() + src[i].to_u128() + carry;
            dst[i] = E::from_u128(sum & Self::mask::<E>());
            carry = sum >> E::BITS;
        }
        carry != 0
    }

    /// Lexicographic comparison, most significant word first.
    fn compare<E: NttElement>(a: &[E; 3], b: &[E; 3]) -> std::cmp::Ordering {
        a.cmp(b)
    }

    /// `dst -= src` modulo `2^(3·width)`. A borrow out of the top word
    /// cancels against a previous carry out of [`Self::add`].
    fn subtract<E: NttElement>(src: &[E; 3], dst: &mut [E; 3]) {
        let mut borrow = 0u128;
        for i in (0..3).rev() {
            let take = src[i].to_u128() + borrow;
            let have = dst[i].to_u128();
            if have >= take {
                dst[i] = E::from_u128(have - take);
                borrow = 0;
            } else {
                dst[i] = E::from_u128((1u128 << E::BITS) + have - take);
                borrow = 1;
            }
        }
    }

    /// `m · y` as three words (two-word `m`, one-word `y`).
    fn multiply_word<E: NttElement>(m: &[E; 2], y: E) -> [E; 3] {
        let y = y.to_u128();
        let lo = m[1].to_u128() * y;
        let hi = m[0].to_u128() * y + (lo >> E::BITS);
        [
            E::from_u128(hi >> E::BITS),
            E::from_u128(hi & Self::mask::<E>()),
            E::from_u128(lo & Self::mask::<E>()),
        ]
    }

    /// Divide the accumulator by the digit base, keeping the quotient and
    /// returning the remainder (the emitted digit).
    fn divide<E: NttElement>(&self, acc: &mut [E; 3]) -> E {
        let base = u128::from(self.base);
        let mut r = 0u128;
        for word in acc.iter_mut() {
            let cur = (r << E::BITS) + word.to_u128();
            *word = E::from_u128(cur / base);
            r = cur % base;
        }
        E::from_u128(r)
    }

    /// Single-digit base addition: `a + b + carry`, carry in `{0, 1}`.
    fn digit_add<E: NttElement>(&self, a: E, b: E, carry: u64) -> (E, u64) {
        let sum = a.to_u128() + b.to_u128() + u128::from(carry);
        let base = u128::from(self.base);
        if sum >= base {
            (E::from_u128(sum - base), 1)
        } else {
            (E::from_u128(sum), 0)
        }
    }
}

/// Performs the final carry-CRT step of a three-modulus NTT convolution.
pub struct CarryCrt<E: NttElement> {
    math: CrtMath,
    constants: &'static CrtConstants<E>,
    num_processors: usize,
}

impl<E: NttElement> CarryCrt<E> {
    /// Create a carry-CRT for the given radix.
    pub fn new(radix: u32) -> NttResult<Self> {
        let (base, _) = base_for_radix::<E>(radix)?;
        Ok(Self {
            math: CrtMath { base },
            constants: cached_constants::<E>(),
            num_processors: Context::global().num_processors,
        })
    }

    /// Combine three equal-length residue sets into carry-propagated
    /// digits of the target base, keeping the `result_size` most
    /// significant digits.
    ///
    /// Assumes `MODULUS[0] > MODULUS[1] > MODULUS[2]`. The returned
    /// storage's first element may or may not be zero depending on the
    /// magnitude of the result.
    pub fn carry_crt(
        &self,
        result_mod0: &DataStorage<E>,
        result_mod1: &DataStorage<E>,
        result_mod2: &DataStorage<E>,
        result_size: u64,
    ) -> NttResult<DataStorage<E>> {
        let residue_size = result_mod0.size();
        assert_eq!(residue_size, result_mod1.size(), "residue size mismatch");
        assert_eq!(residue_size, result_mod2.size(), "residue size mismatch");
        assert!(
            result_size >= 1 && result_size <= residue_size,
            "result size {result_size} outside 1..={residue_size}"
        );

        // A couple of extra elements when not the full result is needed.
        let size = (result_size + 2).min(residue_size);

        let data_storage = DataStorage::<E>::create(result_size)?;
        let passer = MessagePasser::<u64, [E; 2]>::new();

        let parallel = size <= i32::MAX as u64
            && self.num_processors > 1
            && size >= 4 * self.num_processors as u64
            && result_mod0.is_random_access()
            && result_mod1.is_random_access()
            && result_mod2.is_random_access()
            && data_storage.is_random_access();

        if parallel {
            let block_count = self.num_processors;
            let base_len = size / block_count as u64;
            let blocks: Vec<(u64, u64)> = (0..block_count as u64)
                .map(|i| {
                    let offset = i * base_len;
                    let length = if i == block_count as u64 - 1 {
                        size - offset
                    } else {
                        base_len
                    };
                    (offset, length)
                })
                .collect();

            let failure = Mutex::new(None);
            run_blocks(block_count, |index| {
                let (offset, length) = blocks[index];
                let result = self.crt_block(
                    result_mod0,
                    result_mod1,
                    result_mod2,
                    &data_storage,
                    size,
                    result_size,
                    offset,
                    length,
                    &passer,
                );
                if let Err(e) = result {
                    // An errored block never reached its send; unblock the
                    // next block so the scope can unwind, then record.
                    passer.send_message(offset + length, [E::ZERO; 2]);
                    *failure.lock() = Some(e);
                }
            });
            if let Some(e) = failure.into_inner() {
                return Err(e);
            }
        } else {
            self.crt_block(
                result_mod0,
                result_mod1,
                result_mod2,
                &data_storage,
                size,
                result_size,
                0,
                size,
                &passer,
            )?;
        }

        // The carry out of the most significant block must be zero.
        let carries = passer
            .get_message(&size)
            .expect("carry-CRT finished without final carry message");
        assert_eq!(carries, [E::ZERO; 2], "nonzero carry out of carry-CRT");

        Ok(data_storage)
    }

    /// Process one block: the preliminary carry-CRT pass over
    /// `[offset, offset + length)` (counted from the least significant
    /// end), then the ordered finishing phase.
    #[allow(clippy::too_many_arguments)]
    fn crt_block(
        &self,
        result_mod0: &DataStorage<E>,
        result_mod1: &DataStorage<E>,
        result_mod2: &DataStorage<E>,
        data_storage: &DataStorage<E>,
        size: u64,
        result_size: u64,
        offset: u64,
        length: u64,
        passer: &MessagePasser<u64, [E; 2]>,
    ) -> NttResult<()> {
        // For the first block, ignore the first 1-3 emitted digits; for
        // the last block, emit one extra from the carry.
        let skip_size = if offset == 0 {
            size - result_size + 1
        } else {
            0
        };
        let last_size = u64::from(offset + length == size);
        let non_last_size = 1 - last_size;
        let sub_result_size = length - skip_size + last_size;

        let sub_start = size - offset;
        let sub_end = sub_start - length;
        let sub_result_start = size - offset - length + non_last_size + sub_result_size;
        let sub_result_end = sub_result_start - sub_result_size;

        let m0 = ModMath::<E>::new(0);
        let m1 = ModMath::<E>::new(1);
        let m2 = ModMath::<E>::new(2);
        let c = self.constants;

        let mut src0 = result_mod0.iterator(AccessMode::Read, sub_start, sub_end)?;
        let mut src1 = result_mod1.iterator(AccessMode::Read, sub_start, sub_end)?;
        let mut src2 = result_mod2.iterator(AccessMode::Read, sub_start, sub_end)?;
        let mut dst = data_storage.iterator(AccessMode::Write, sub_result_start, sub_result_end)?;

        let mut carry = [E::ZERO; 3];

        // Preliminary pass: runs in parallel across blocks.
        for i in 0..length {
            let y0 = m0.mod_multiply(c.t[0], src0.get());
            let y1 = m1.mod_multiply(c.t[1], src1.get());
            let y2 = m2.mod_multiply(c.t[2], src2.get());

            let mut sum = CrtMath::multiply_word(&c.m12, y0);
            let tmp = CrtMath::multiply_word(&c.m02, y1);
            if CrtMath::add(&tmp, &mut sum)
                || CrtMath::compare(&sum, &c.m012) != std::cmp::Ordering::Less
            {
                CrtMath::subtract(&c.m012, &mut sum);
            }
            let tmp = CrtMath::multiply_word(&c.m01, y2);
            if CrtMath::add(&tmp, &mut sum)
                || CrtMath::compare(&sum, &c.m012) != std::cmp::Ordering::Less
            {
                CrtMath::subtract(&c.m012, &mut sum);
            }

            CrtMath::add(&sum, &mut carry);
            let digit = self.math.divide(&mut carry);

            // In the first block the leading emitted digits are dropped:
            // zero in full-precision runs, inexact otherwise.
            if i >= skip_size {
                dst.set(digit);
                dst.next()?;
            }

            src0.next()?;
            src1.next()?;
            src2.next()?;
        }

        // Flush the remaining carry into at most two digits.
        let mut result0 = self.math.divide(&mut carry);
        let result1 = carry[2];
        assert_eq!(carry[0], E::ZERO, "carry-CRT overflow");
        assert_eq!(carry[1], E::ZERO, "carry-CRT overflow");

        if sub_result_size == length - skip_size + 1 {
            // Last block: emit the extra digit matching the one skipped
            // in the first block.
            dst.set(result0);
            dst.next()?;
            result0 = result1;
            assert_eq!(result1, E::ZERO, "carry out of the most significant digit");
        }
        dst.close()?;

        let mut results = [result1, result0];

        // Finishing phase: strictly ordered by block offset.
        if offset > 0 {
            let previous = passer.receive_message(&offset);

            // Add the previous block's two carry digits at this block's
            // least significant end and ripple upward, possibly through
            // this block's own outgoing carries.
            let mut it =
                data_storage.iterator(AccessMode::ReadWrite, sub_result_start, sub_result_end)?;
            let mut carry_digit = 0u64;
            let mut index = 0u64;
            while it.has_next() {
                if index >= 2 && carry_digit == 0 {
                    break;
                }
                let add = match index {
                    0 => previous[1],
                    1 => previous[0],
                    _ => E::ZERO,
                };
                let (digit, c_out) = self.math.digit_add(it.get(), add, carry_digit);
                it.set(digit);
                carry_digit = c_out;
                it.next()?;
                index += 1;
            }
            it.close()?;

            // Ripple past the block's top into its outgoing carries.
            let mut tail = [results[1], results[0]];
            for slot in &mut tail {
                if index >= 2 && carry_digit == 0 {
                    break;
                }
                let add = match index {
                    0 => previous[1],
                    1 => previous[0],
                    _ => E::ZERO,
                };
                let (digit, c_out) = self.math.digit_add(*slot, add, carry_digit);
                *slot = digit;
                carry_digit = c_out;
                index += 1;
            }
            assert_eq!(carry_digit, 0, "carry escaped past block carries");
            results = [tail[1], tail[0]];
        }

        passer.send_message(offset + length, results);
        Ok(())
    }
}
