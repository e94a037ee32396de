//! Element-wise comparison of device output against the host reference.

use crate::matrix::Matrix;
use std::fmt;

/// Absolute error above which an element counts as wrong.
///
/// Loose on purpose: device and host reduce in different orders.
pub const TOLERANCE: f32 = 1.0;

/// Outcome of comparing `C` against `C_ref`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationResult {
    pub error_count: usize,
    pub tolerance: f32,
    /// Largest absolute difference seen (NaN-aware: NaN counts as an error).
    pub max_abs_error: f32,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.error_count == 0
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(f, "Result matrix is correct")
        } else {
            write!(f, "Result matrix is incorrect, {} errors", self.error_count)
        }
    }
}

/// Count elements with `|c - c_ref| > TOLERANCE`.
///
/// Never fails. Elements beyond the shorter slice are counted as errors so a
/// short readback cannot pass.
pub fn validate(c: &[f32], c_ref: &[f32]) -> ValidationResult {
    validate_with_tolerance(c, c_ref, TOLERANCE)
}

fn validate_with_tolerance(c: &[f32], c_ref: &[f32], tolerance: f32) -> ValidationResult {
    let mut error_count = c.len().abs_diff(c_ref.len());
    let mut max_abs_error = 0.0f32;
    for (&got, &want) in c.iter().zip(c_ref) {
        let diff = (got - want).abs();
        // `!(diff <= tol)` so NaN is an error.
        if !(diff <= tolerance) {
            error_count += 1;
        }
        if diff > max_abs_error || diff.is_nan() {
            max_abs_error = diff;
        }
    }
    ValidationResult { error_count, tolerance, max_abs_error }
}

/// [`validate`] over whole matrices.
pub fn validate_matrices(c: &Matrix, c_ref: &Matrix) -> ValidationResult {
    validate(c.as_slice(), c_ref.as_slice())
}
