//! Row-major `f32` matrices and benchmark input generation.

use crate::config::BenchmarkConfig;
use crate::error::{BenchError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Dense row-major matrix. `data.len() == rows * cols` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Wrap an existing buffer, checking its length.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            BenchError::InvalidArguments(format!("{rows}x{cols} matrix overflows usize"))
        })?;
        if data.len() != expected {
            return Err(BenchError::InvalidArguments(format!(
                "{rows}x{cols} matrix needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Uniform values in `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols).map(|_| rng.random::<f32>()).collect();
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Element at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }
}

/// The two benchmark operands.
#[derive(Debug, Clone)]
pub struct Operands {
    /// `m × k`
    pub a: Matrix,
    /// `k × n`
    pub b: Matrix,
    /// Seed the operands were drawn from.
    pub seed: u64,
}

impl Operands {
    /// Draw `A` and `B` from a seeded generator.
    pub fn generate(cfg: &BenchmarkConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = Matrix::random(cfg.m(), cfg.k(), &mut rng);
        let b = Matrix::random(cfg.k(), cfg.n(), &mut rng);
        Self { a, b, seed }
    }

    /// Seed from OS entropy.
    pub fn entropy_seed() -> u64 {
        rand::random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_exact_length() {
        let m = Matrix::zeros(3, 5);
        assert_eq!(m.len(), 15);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Matrix::from_vec(2, 2, vec![1.0; 3]).unwrap_err();
        assert!(err.to_string().contains("needs 4 elements, got 3"));
    }

    #[test]
    fn get_is_row_major() {
        let m = Matrix::from_vec(2, 3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(m.get(1, 0), Some(3.0));
        assert_eq!(m.get(0, 2), Some(2.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.get(0, 3), None);
    }

    #[test]
    fn random_values_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = Matrix::random(16, 16, &mut rng);
        assert!(m.as_slice().iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn operands_have_config_shapes() {
        let cfg = BenchmarkConfig::new(3, 4, 5, 1, 1).unwrap();
        let ops = Operands::generate(&cfg, 1);
        assert_eq!((ops.a.rows(), ops.a.cols()), (3, 5));
        assert_eq!((ops.b.rows(), ops.b.cols()), (5, 4));
    }

    #[test]
    fn same_seed_same_operands() {
        let cfg = BenchmarkConfig::new(8, 8, 8, 1, 1).unwrap();
        let x = Operands::generate(&cfg, 42);
        let y = Operands::generate(&cfg, 42);
        assert_eq!(x.a, y.a);
        assert_eq!(x.b, y.b);
    }

    #[test]
    fn different_seed_different_operands() {
        let cfg = BenchmarkConfig::new(8, 8, 8, 1, 1).unwrap();
        assert_ne!(Operands::generate(&cfg, 1).a, Operands::generate(&cfg, 2).a);
    }
}
