//! Transform strategy selection.
//!
//! Rounds the requested length up to `2^a` or `3·2^a` and picks the
//! power-of-two kernel by the context's cache and memory budgets, with
//! factor-3 wrapping when the rounded length has the factor of three.

use mpfloat_storage::Context;

use crate::element::NttElement;
use crate::factor3::{Factor3NttStrategy, Factor3SixStepNttStrategy};
use crate::six_step::SixStepFntStrategy;
use crate::strategy::NttStrategy;
use crate::table_fnt::TableFntStrategy;
use crate::two_pass::TwoPassFntStrategy;

/// Smallest power of two that is `>= size`.
#[must_use]
pub fn round2_up(size: u64) -> u64 {
    size.max(1).next_power_of_two()
}

/// Smallest `2^a` or `3·2^a` that is `>= size`.
#[must_use]
pub fn round23_up(size: u64) -> u64 {
    let p2 = round2_up(size);
    let p3 = 3 * (p2 / 4);
    if p3 >= size {
        p3
    } else {
        p2
    }
}

/// Factory for transform strategies fitting a requested size.
#[derive(Debug, Default)]
pub struct NttBuilder;

impl NttBuilder {
    /// Create the transform strategy for `size` input elements.
    #[must_use]
    pub fn create<E: NttElement>(size: u64) -> Box<dyn NttStrategy<E>> {
        let ctx = Context::global();
        let cache_elements = (ctx.cache_l1_size / E::SIZE) as u64;
        let max_block_elements = (ctx.max_memory_block / E::SIZE) as u64;

        let size = round23_up(size);
        let power2_size = size & size.wrapping_neg();
        let use_factor3 = size != power2_size;

        // Select the kernel for the power-of-two part.
        #[derive(PartialEq)]
        enum Kind {
            Table,
            SixStep,
            TwoPass,
        }
        let kind = if power2_size <= cache_elements / 2 {
            // The transform plus its w-table fit in cache.
            Kind::Table
        } else if power2_size <= max_block_elements && power2_size <= i32::MAX as u64 {
            Kind::SixStep
        } else {
            Kind::TwoPass
        };

        tracing::debug!(
            size,
            factor3 = use_factor3,
            kernel = match kind {
                Kind::Table => "table",
                Kind::SixStep => "six-step",
                Kind::TwoPass => "two-pass",
            },
            "selected NTT strategy"
        );

        if use_factor3 {
            if kind == Kind::SixStep && size <= max_block_elements && size <= i32::MAX as u64 {
                // The whole 3·2^k transform fits in memory.
                return Box::new(Factor3SixStepNttStrategy::new(SixStepFntStrategy::new()));
            }
            let factor2: Box<dyn NttStrategy<E>> = match kind {
                Kind::Table => Box::new(TableFntStrategy::new()),
                Kind::SixStep => Box::new(SixStepFntStrategy::new()),
                Kind::TwoPass => Box::new(TwoPassFntStrategy::new()),
            };
            return Box::new(Factor3NttStrategy::new(factor2));
        }

        match kind {
            Kind::Table => Box::new(TableFntStrategy::new()),
            Kind::SixStep => Box::new(SixStepFntStrategy::new()),
            Kind::TwoPass => Box::new(TwoPassFntStrategy::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round2_up(1), 1);
        assert_eq!(round2_up(5), 8);
        assert_eq!(round23_up(1), 1);
        assert_eq!(round23_up(3), 3);
        assert_eq!(round23_up(4), 4);
        assert_eq!(round23_up(5), 6);
        assert_eq!(round23_up(48), 48);
        assert_eq!(round23_up(49), 64);
        assert_eq!(round23_up(97), 128);
        assert_eq!(round23_up(100), 128);
        assert_eq!(round23_up(129), 192);
    }

    #[test]
    fn selected_strategy_reports_rounded_length() {
        let strategy = NttBuilder::create::<u32>(100);
        assert!(strategy.transform_length(100) >= 100);
    }

    #[test]
    fn builder_output_roundtrips() {
        use mpfloat_storage::{AccessMode, DataStorage};

        for n in [16u64, 48, 96, 256] {
            let strategy = NttBuilder::create::<u32>(n);
            let len = strategy.transform_length(n);
            let storage = DataStorage::<u32>::memory(len);
            let mut original = Vec::new();
            {
                let mut it = storage.iterator(AccessMode::Write, 0, len).unwrap();
                for i in 0..len {
                    #[allow(clippy::cast_possible_truncation)]
                    let v = (i as u32).wrapping_mul(1_664_525).wrapping_add(1) % 999_983;
                    it.set(v);
                    original.push(v);
                    it.next().unwrap();
                }
            }
            strategy.transform(&storage, 0).unwrap();
            strategy.inverse_transform(&storage, 0, len).unwrap();
            let after: Vec<u32> = (0..len).map(|i| storage.get(i).unwrap()).collect();
            assert_eq!(after, original, "n={n}");
        }
    }
}
