//! Property-based tests for the statistical building blocks.
//!
//! These check invariants that must hold for every input, not just the
//! scenarios exercised elsewhere:
//!
//! - PSI, the KS approximation and the JS distance stay in `[0, 1]`, and JS
//!   is symmetric.
//! - Cramer's V stays in `[0, 1]`.
//! - Equal-width histogram edges are strictly increasing.
//! - A valid 2x2 correlation matrix always factorizes, and synthetic numeric
//!   values never leave the profiled range.

use std::collections::BTreeMap;

use proptest::prelude::*;
use term_profile::drift::metrics::{categorical_psi, js_divergence, ks_approximation, numeric_psi};
use term_profile::drift::Quartiles;
use term_profile::engine::{CellValue, ColumnSummary, DeclaredKind};
use term_profile::profile::statistics::{cramers_v, equal_width_edges};
use term_profile::profile::{
    ColumnCorrelation, ColumnProfile, CorrelationStrength, DistributionFamily, Profile, SemanticType,
};
use term_profile::synth::cholesky::cholesky;
use term_profile::synth::{SynthesisConfig, SyntheticDataGenerator};

fn distribution(weights: &[u32]) -> BTreeMap<String, f64> {
    let total: u32 = weights.iter().sum::<u32>().max(1);
    weights
        .iter()
        .enumerate()
        .map(|(i, w)| (format!("v{i}"), f64::from(*w) / f64::from(total)))
        .collect()
}

fn quartiles() -> impl Strategy<Value = Quartiles> {
    (-1000.0f64..1000.0, 0.0f64..50.0, 0.0f64..50.0).prop_map(|(median, lo, hi)| Quartiles {
        q25: median - lo,
        median,
        q75: median + hi,
    })
}

proptest! {
    #[test]
    fn prop_numeric_psi_bounded(
        bm in -1e6f64..1e6,
        bs in 0.0f64..1e3,
        cm in -1e6f64..1e6,
        cs in 0.0f64..1e3,
    ) {
        let psi = numeric_psi(bm, bs, cm, cs);
        prop_assert!((0.0..=1.0).contains(&psi));
        prop_assert_eq!(numeric_psi(bm, bs, bm, bs), 0.0);
    }

    #[test]
    fn prop_ks_bounded(base in quartiles(), cur in quartiles()) {
        let ks = ks_approximation(base, cur);
        prop_assert!((0.0..=1.0).contains(&ks));
        prop_assert_eq!(ks_approximation(base, base), 0.0);
    }

    #[test]
    fn prop_categorical_metrics(
        a in prop::collection::vec(0u32..1000, 1..12),
        b in prop::collection::vec(0u32..1000, 1..12),
    ) {
        let p = distribution(&a);
        let q = distribution(&b);
        let psi = categorical_psi(&p, &q);
        let js = js_divergence(&p, &q);
        prop_assert!((0.0..=1.0).contains(&psi));
        prop_assert!((0.0..=1.0).contains(&js));
        prop_assert!((js - js_divergence(&q, &p)).abs() < 1e-9);
        prop_assert!(js_divergence(&p, &p).abs() < 1e-9);
    }

    #[test]
    fn prop_cramers_v_bounded(
        table in prop::collection::vec(prop::collection::vec(0u64..200, 2..6), 2..6),
    ) {
        if let Some((chi_square, v)) = cramers_v(&table) {
            prop_assert!(chi_square >= 0.0);
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn prop_histogram_edges_increase(
        min in -1e9f64..1e9,
        width in 1e-3f64..1e9,
        bins in 1usize..64,
    ) {
        if let Some(edges) = equal_width_edges(min, min + width, bins) {
            prop_assert_eq!(edges.len(), bins + 1);
            prop_assert!(edges.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(edges[0], min);
        }
    }

    #[test]
    fn prop_valid_correlation_factorizes(r in -0.99f64..0.99) {
        let lower = cholesky(&[vec![1.0, r], vec![r, 1.0]]).unwrap();
        let rebuilt = lower[1][0] * lower[1][0] + lower[1][1] * lower[1][1];
        prop_assert!((rebuilt - 1.0).abs() < 1e-9);
        prop_assert!((lower[1][0] - r).abs() < 1e-12);
    }

    #[test]
    fn prop_synthetic_values_in_range(
        r in -0.95f64..0.95,
        mean in -100.0f64..100.0,
        std in 0.1f64..50.0,
        seed in any::<u64>(),
    ) {
        let column = |name: &str| {
            let summary = ColumnSummary {
                name: name.to_string(),
                declared_type: "Float64".to_string(),
                declared_kind: DeclaredKind::Float,
                row_count: 100,
                non_null_count: 100,
                distinct_count: 100,
                min: Some(CellValue::Float(mean - 2.0 * std)),
                max: Some(CellValue::Float(mean + 2.0 * std)),
                mean: Some(mean),
                std_dev: Some(std),
                q25: None,
                median: Some(mean),
                q75: None,
                null_fraction: 0.0,
            };
            let mut c = ColumnProfile::from_summary(&summary, SemanticType::Numeric);
            c.distribution = Some(DistributionFamily::Normal);
            c
        };
        let profile = Profile {
            source: "prop".into(),
            row_count: 100,
            columns: vec![column("a"), column("b")],
            correlations: vec![ColumnCorrelation {
                column_a: "a".into(),
                column_b: "b".into(),
                coefficient: r,
                strength: CorrelationStrength::from_coefficient(r),
            }],
            conditionals: Vec::new(),
            alerts: Vec::new(),
            target: None,
            profiled_at: chrono::Utc::now(),
        };
        let mut generator =
            SyntheticDataGenerator::new(&profile, SynthesisConfig::default(), seed).unwrap();
        for row in generator.rows(50) {
            for cell in row {
                let v = cell.as_f64().unwrap();
                prop_assert!(v >= mean - 2.0 * std && v <= mean + 2.0 * std);
            }
        }
    }
}
