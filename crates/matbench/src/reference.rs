//! Host reference matrix multiply.
//!
//! Ground truth for validating device output. Deliberately the plain triple
//! loop with `f32` accumulation over the shared dimension, single-threaded,
//! and never touching device buffers.

use crate::error::{BenchError, Result};
use crate::matrix::Matrix;

/// `C = A * B` with A `m × k`, B `k × n`, C `m × n`, all row-major.
///
/// # Panics
///
/// Panics if a slice length disagrees with its dimensions.
pub fn ref_matmul(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    assert_eq!(a.len(), m * k, "A dimensions mismatch");
    assert_eq!(b.len(), k * n, "B dimensions mismatch");
    assert_eq!(c.len(), m * n, "C dimensions mismatch");

    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for l in 0..k {
                sum += a[i * k + l] * b[l * n + j];
            }
            c[i * n + j] = sum;
        }
    }
}

/// Compute a fresh `C_ref` from `A` and `B`.
pub fn reference_product(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.cols() != b.rows() {
        return Err(BenchError::InvalidArguments(format!(
            "inner dimensions differ: A is {}x{}, B is {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let mut c = Matrix::zeros(m, n);
    ref_matmul(a.as_slice(), b.as_slice(), c.as_mut_slice(), m, n, k);
    Ok(c)
}
