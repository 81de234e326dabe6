//! Bit-reversal permutation tables.

/// Swap pairs for the bit-reversal permutation of a length-`n` array
/// (`n` a power of two). Each pair is swapped exactly once.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn create_scramble_table(n: usize) -> Vec<[u32; 2]> {
    debug_assert!(n.is_power_of_two() || n <= 1);
    if n < 2 {
        return Vec::new();
    }
    let bits = n.trailing_zeros();
    let mut table = Vec::new();
    for i in 0..n {
        let j = ((i as u32).reverse_bits() >> (32 - bits)) as usize;
        if i < j {
            table.push([i as u32, j as u32]);
        }
    }
    table
}

/// Apply a scramble table to `data`.
pub fn scramble<T>(data: &mut [T], table: &[[u32; 2]]) {
    for &[i, j] in table {
        data.swap(i as usize, j as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scramble_is_bit_reversal() {
        let mut data: Vec<usize> = (0..8).collect();
        let table = create_scramble_table(8);
        scramble(&mut data, &table);
        assert_eq!(data, vec![0, 4, 2, 6, 1, 5, 3, 7]);
    }

    #[test]
    fn scramble_is_involution() {
        let table = create_scramble_table(16);
        let mut data: Vec<usize> = (0..16).collect();
        scramble(&mut data, &table);
        scramble(&mut data, &table);
        assert_eq!(data, (0..16).collect::<Vec<_>>());
    }
}
