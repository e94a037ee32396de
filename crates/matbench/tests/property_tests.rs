//! Property-based tests for the host reference, timing statistics and
//! result validation.

use matbench::config::{BenchmarkConfig, LaunchGeometry};
use matbench::reference::{ref_matmul, reference_product};
use matbench::stats::TimingSummary;
use matbench::validation::{TOLERANCE, validate};
use matbench::{Matrix, Operands};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────────

fn arb_dims() -> impl Strategy<Value = (usize, usize, usize)> {
    (1usize..=12, 1usize..=12, 1usize..=12)
}

fn arb_millis() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..1_000.0, 1..64)
}

// ── Reference product ──────────────────────────────────────────────────────

proptest! {
    /// `C_ref` is always `m × n`.
    #[test]
    fn reference_has_output_shape((m, n, k) in arb_dims(), seed in any::<u64>()) {
        let cfg = BenchmarkConfig::new(m as i64, n as i64, k as i64, 1, 1).unwrap();
        let ops = Operands::generate(&cfg, seed);
        let c = reference_product(&ops.a, &ops.b).unwrap();
        prop_assert_eq!((c.rows(), c.cols()), (m, n));
    }

    /// Recomputing from the same inputs yields bit-identical output.
    #[test]
    fn reference_is_deterministic((m, n, k) in arb_dims(), seed in any::<u64>()) {
        let cfg = BenchmarkConfig::new(m as i64, n as i64, k as i64, 1, 1).unwrap();
        let ops = Operands::generate(&cfg, seed);
        let first = reference_product(&ops.a, &ops.b).unwrap();
        let second = reference_product(&ops.a, &ops.b).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Multiplying by the identity returns `A`.
    #[test]
    fn identity_is_neutral((m, _n, k) in arb_dims(), seed in any::<u64>()) {
        let cfg = BenchmarkConfig::new(m as i64, k as i64, k as i64, 1, 1).unwrap();
        let a = Operands::generate(&cfg, seed).a;
        let mut eye = Matrix::zeros(k, k);
        for i in 0..k {
            eye.as_mut_slice()[i * k + i] = 1.0;
        }
        let mut c = vec![0.0; m * k];
        ref_matmul(a.as_slice(), eye.as_slice(), &mut c, m, k, k);
        prop_assert_eq!(c.as_slice(), a.as_slice());
    }

    /// Inputs in [0, 1) keep every output element in [0, k].
    #[test]
    fn outputs_bounded_by_shared_dimension((m, n, k) in arb_dims(), seed in any::<u64>()) {
        let cfg = BenchmarkConfig::new(m as i64, n as i64, k as i64, 1, 1).unwrap();
        let ops = Operands::generate(&cfg, seed);
        let c = reference_product(&ops.a, &ops.b).unwrap();
        for &v in c.as_slice() {
            prop_assert!((0.0..=k as f32).contains(&v), "value {v} out of [0, {k}]");
        }
    }
}

// ── Timing statistics ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn std_dev_is_non_negative(millis in arb_millis()) {
        let s = TimingSummary::from_millis(&millis).unwrap();
        prop_assert!(s.std_dev_ms >= 0.0);
        prop_assert!(s.min_ms <= s.mean_ms + 1e-9 && s.mean_ms <= s.max_ms + 1e-9);
    }

    #[test]
    fn equal_samples_have_zero_spread(t in 0.0f64..1_000.0, runs in 1usize..32) {
        let s = TimingSummary::from_millis(&vec![t; runs]).unwrap();
        prop_assert!(s.std_dev_ms.abs() < 1e-9);
        prop_assert!((s.mean_ms - t).abs() < 1e-9);
    }
}

// ── Validation ─────────────────────────────────────────────────────────────

proptest! {
    /// Perturbing exactly `j` elements past the tolerance yields `j` errors.
    #[test]
    fn counts_exactly_the_perturbed_elements(
        base in prop::collection::vec(-100.0f32..100.0, 1..128),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..16),
    ) {
        let mut idx: Vec<usize> = picks.iter().map(|p| p.index(base.len())).collect();
        idx.sort_unstable();
        idx.dedup();

        let mut c = base.clone();
        for &i in &idx {
            c[i] += TOLERANCE * 4.0;
        }
        let result = validate(&c, &base);
        prop_assert_eq!(result.error_count, idx.len());
    }

    /// Differences within the tolerance never count.
    #[test]
    fn within_tolerance_passes(
        base in prop::collection::vec(-100.0f32..100.0, 1..128),
        delta in -0.5f32..0.5,
    ) {
        let c: Vec<f32> = base.iter().map(|v| v + delta).collect();
        prop_assert!(validate(&c, &base).passed());
    }
}

// ── Launch geometry ────────────────────────────────────────────────────────

proptest! {
    /// Column groups times `n_works` always cover `n` exactly.
    #[test]
    fn geometry_covers_every_column(
        m in 1i64..64,
        groups in 1i64..64,
        n_works in prop_oneof![Just(1i64), Just(2), Just(4), Just(8)],
    ) {
        let cfg = BenchmarkConfig::new(m, groups * n_works, 4, 1, n_works).unwrap();
        let g = LaunchGeometry::new(&cfg, 64).unwrap();
        prop_assert_eq!(g.global[0], cfg.m());
        prop_assert_eq!(g.global[1] * cfg.n_works(), cfg.n());
        prop_assert_eq!(g.local[1] * cfg.n_works(), 64);
    }
}
