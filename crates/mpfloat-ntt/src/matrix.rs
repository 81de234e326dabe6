//! In-place matrix transposition for the six-step transform.
//!
//! The six-step reshape only ever produces `n1 × n2` matrices with
//! `n2 = n1` or `n2 = 2·n1` (both powers of two), so full rectangular
//! transposition reduces to square transposes plus a block row shuffle.

/// Transpose a `rows × cols` row-major matrix into `cols × rows`,
/// in place. Requires `rows == cols`, `cols == 2·rows` or
/// `rows == 2·cols`.
pub fn transpose<T: Copy>(data: &mut [T], rows: usize, cols: usize) {
    debug_assert_eq!(data.len(), rows * cols);
    if rows == cols {
        transpose_square(data, rows);
    } else if cols == rows * 2 {
        // [A | B] row-interleaved -> [Aᵀ ; Bᵀ] stacked:
        // gather the two square halves, then transpose each.
        unshuffle_chunks(data, rows);
        transpose_square(&mut data[..rows * rows], rows);
        transpose_square(&mut data[rows * rows..], rows);
    } else if rows == cols * 2 {
        // Inverse of the case above.
        transpose_square(&mut data[..cols * cols], cols);
        transpose_square(&mut data[cols * cols..], cols);
        shuffle_chunks(data, cols);
    } else {
        unreachable!("unsupported transpose shape {rows}x{cols}");
    }
}

/// Transpose an `n × n` row-major matrix in place.
fn transpose_square<T: Copy>(data: &mut [T], n: usize) {
    for i in 0..n {
        for j in (i + 1)..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}

/// Permute `2·n` chunks of `chunk` elements from interleaved order
/// `A0 B0 A1 B1 …` to stacked order `A0 A1 … B0 B1 …`.
fn unshuffle_chunks<T: Copy>(data: &mut [T], chunk: usize) {
    permute_chunks(data, chunk, |s, n| if s % 2 == 0 { s / 2 } else { n + s / 2 });
}

/// Inverse of [`unshuffle_chunks`].
fn shuffle_chunks<T: Copy>(data: &mut [T], chunk: usize) {
    permute_chunks(data, chunk, |s, n| if s < n { 2 * s } else { 2 * (s - n) + 1 });
}

/// Apply chunk permutation `dest(src, half_count)` by following cycles.
fn permute_chunks<T: Copy>(data: &mut [T], chunk: usize, dest: impl Fn(usize, usize) -> usize) {
    let count = data.len() / chunk;
    let half = count / 2;
    let mut visited = vec![false; count];
    let mut temp = vec![data[0]; chunk];

    for start in 0..count {
        if visited[start] {
            continue;
        }
        // Walk the cycle containing `start`, carrying one chunk.
        temp.copy_from_slice(&data[start * chunk..(start + 1) * chunk]);
        let mut src = start;
        loop {
            visited[src] = true;
            let d = dest(src, half);
            if d == start {
                data[d * chunk..(d + 1) * chunk].copy_from_slice(&temp);
                break;
            }
            // Save the destination chunk, move the carried one in.
            for k in 0..chunk {
                let v = data[d * chunk + k];
                data[d * chunk + k] = temp[k];
                temp[k] = v;
            }
            src = d;
        }
    }
}
