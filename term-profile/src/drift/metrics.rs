//! Divergence metrics between two profiled columns.
//!
//! Every metric is computed from profile statistics alone, never from raw
//! rows, and is clamped to `[0, 1]`.

use std::collections::{BTreeMap, BTreeSet};

use crate::profile::statistics::clamp01;
use crate::profile::types::ColumnProfile;

/// Probability floor applied before taking logarithms.
pub const PROBABILITY_FLOOR: f64 = 1e-4;

/// Key of the bucket holding every value outside the top values.
pub const OTHER_BUCKET: &str = "(other)";

const EPSILON: f64 = 1e-12;

/// Approximate PSI of a numeric column from its first two moments.
///
/// `0.1 * |mean shift| / baseline std + 0.1 * |ln(variance ratio)|`, clamped.
/// Degenerate spreads count as maximal change unless both sides agree.
pub fn numeric_psi(base_mean: f64, base_std: f64, cur_mean: f64, cur_std: f64) -> f64 {
    let shift = (cur_mean - base_mean).abs();
    if base_std <= EPSILON || cur_std <= EPSILON {
        let unchanged = shift <= EPSILON && (cur_std - base_std).abs() <= EPSILON;
        return if unchanged { 0.0 } else { 1.0 };
    }
    let log_variance_ratio = ((cur_std * cur_std) / (base_std * base_std)).ln().abs();
    clamp01(0.1 * shift / base_std + 0.1 * log_variance_ratio)
}

/// Quartiles of one column: Q25, median, Q75.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
}

impl Quartiles {
    pub fn of(column: &ColumnProfile) -> Option<Self> {
        Some(Self {
            q25: column.q25?,
            median: column.median?,
            q75: column.q75?,
        })
    }

    pub fn iqr(&self) -> f64 {
        self.q75 - self.q25
    }
}

/// Approximate Kolmogorov-Smirnov distance from quartiles.
///
/// The largest quartile shift and the change in IQR width, both relative to
/// the average IQR, are averaged and clamped.
pub fn ks_approximation(base: Quartiles, cur: Quartiles) -> f64 {
    let max_delta = (cur.q25 - base.q25)
        .abs()
        .max((cur.median - base.median).abs())
        .max((cur.q75 - base.q75).abs());
    let width_delta = (cur.iqr() - base.iqr()).abs();
    let avg_iqr = (base.iqr() + cur.iqr()) / 2.0;

    if avg_iqr <= EPSILON {
        return if max_delta <= EPSILON && width_delta <= EPSILON {
            0.0
        } else {
            1.0
        };
    }
    clamp01((max_delta / avg_iqr + width_delta / avg_iqr) / 2.0)
}

/// Share of non-null rows per top value, plus the [`OTHER_BUCKET`] remainder.
///
/// Returns `None` when the column has no top values.
pub fn categorical_distribution(column: &ColumnProfile) -> Option<BTreeMap<String, f64>> {
    let top = column.top_values.as_ref()?;
    let non_null = column.non_null_count();
    if non_null == 0 || top.values.is_empty() {
        return None;
    }
    let total = non_null as f64;
    let mut shares: BTreeMap<String, f64> = top
        .values
        .iter()
        .map(|v| (v.value.clone(), v.count as f64 / total))
        .collect();
    if top.other_count > 0 {
        shares.insert(OTHER_BUCKET.to_string(), top.other_count as f64 / total);
    }
    Some(shares)
}

/// Aligns two distributions over the union of their keys.
fn aligned(
    base: &BTreeMap<String, f64>,
    cur: &BTreeMap<String, f64>,
) -> Vec<(f64, f64)> {
    let keys: BTreeSet<&String> = base.keys().chain(cur.keys()).collect();
    keys.into_iter()
        .map(|k| {
            (
                base.get(k).copied().unwrap_or(0.0),
                cur.get(k).copied().unwrap_or(0.0),
            )
        })
        .collect()
}

/// Population stability index over the union of observed values.
pub fn categorical_psi(base: &BTreeMap<String, f64>, cur: &BTreeMap<String, f64>) -> f64 {
    let psi: f64 = aligned(base, cur)
        .into_iter()
        .map(|(p, q)| {
            let p = p.max(PROBABILITY_FLOOR);
            let q = q.max(PROBABILITY_FLOOR);
            (q - p) * (q / p).ln()
        })
        .sum();
    clamp01(psi)
}

/// Jensen-Shannon distance between two distributions.
///
/// The divergence is taken in nats, normalized by `ln 2` into `[0, 1]`, and
/// reported as its square root, which is a metric and keeps moderate shifts
/// visible. Symmetric in its arguments.
pub fn js_divergence(base: &BTreeMap<String, f64>, cur: &BTreeMap<String, f64>) -> f64 {
    let pairs = aligned(base, cur);
    let p_total: f64 = pairs.iter().map(|(p, _)| p).sum();
    let q_total: f64 = pairs.iter().map(|(_, q)| q).sum();
    if p_total <= EPSILON || q_total <= EPSILON {
        return 0.0;
    }

    let kl = |a: f64, m: f64| if a > 0.0 { a * (a / m).ln() } else { 0.0 };
    let divergence: f64 = pairs
        .iter()
        .map(|(p, q)| {
            let p = p / p_total;
            let q = q / q_total;
            let m = (p + q) / 2.0;
            if m <= 0.0 {
                0.0
            } else {
                0.5 * kl(p, m) + 0.5 * kl(q, m)
            }
        })
        .sum();

    clamp01(divergence / std::f64::consts::LN_2).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_numeric_psi_identity_and_shift() {
        assert_eq!(numeric_psi(10.0, 2.0, 10.0, 2.0), 0.0);
        // One standard deviation of shift contributes 0.1.
        assert!((numeric_psi(10.0, 2.0, 12.0, 2.0) - 0.1).abs() < 1e-12);
        assert!(numeric_psi(10.0, 2.0, 10.0, 4.0) > 0.1);
        assert_eq!(numeric_psi(10.0, 2.0, 500.0, 2.0), 1.0);
        assert_eq!(numeric_psi(5.0, 0.0, 5.0, 0.0), 0.0);
        assert_eq!(numeric_psi(5.0, 0.0, 6.0, 0.0), 1.0);
    }

    #[test]
    fn test_ks_approximation() {
        let q = Quartiles {
            q25: 8.0,
            median: 10.0,
            q75: 12.0,
        };
        assert_eq!(ks_approximation(q, q), 0.0);
        let shifted = Quartiles {
            q25: 9.0,
            median: 11.0,
            q75: 13.0,
        };
        assert!((ks_approximation(q, shifted) - 0.125).abs() < 1e-12);
        let flat = Quartiles {
            q25: 1.0,
            median: 1.0,
            q75: 1.0,
        };
        assert_eq!(ks_approximation(flat, flat), 0.0);
    }

    #[test]
    fn test_categorical_psi() {
        let p = dist(&[("A", 0.5), ("B", 0.5)]);
        assert_eq!(categorical_psi(&p, &p), 0.0);
        let q = dist(&[("A", 0.6), ("B", 0.4)]);
        let psi = categorical_psi(&p, &q);
        assert!(psi > 0.0 && psi < 0.1);
        // A value that vanishes is floored instead of producing infinity.
        let gone = dist(&[("A", 1.0)]);
        assert_eq!(categorical_psi(&p, &gone), 1.0);
    }

    #[test]
    fn test_js_divergence_properties() {
        let p = dist(&[("A", 0.9), ("B", 0.1)]);
        let q = dist(&[("A", 0.4), ("B", 0.6)]);
        assert_eq!(js_divergence(&p, &p), 0.0);
        let forward = js_divergence(&p, &q);
        let backward = js_divergence(&q, &p);
        assert!((forward - backward).abs() < 1e-12);
        assert!(forward > 0.3 && forward <= 1.0);

        let disjoint_a = dist(&[("A", 1.0)]);
        let disjoint_b = dist(&[("B", 1.0)]);
        assert!((js_divergence(&disjoint_a, &disjoint_b) - 1.0).abs() < 1e-12);
    }
}
