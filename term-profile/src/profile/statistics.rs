//! Pure statistical helpers shared by enrichment, relationships and drift.
//!
//! Nothing here touches the engine; every function works on numbers the
//! engine already returned.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::profile::types::{DistributionFamily, Histogram, TemporalStats, TimeGranularity};

const HOUR_SECONDS: i64 = 3_600;
const DAY_SECONDS: i64 = 86_400;

/// Share of deltas the most common gap must cover to be reported.
const DOMINANT_GAP_SHARE: f64 = 0.8;

/// Clamps a score into [0, 1], mapping NaN to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Skewness and excess kurtosis from central moments m2, m3, m4.
///
/// Returns `None` when the second moment is zero or not finite.
pub fn standardized_moments(m2: f64, m3: f64, m4: f64) -> Option<(f64, f64)> {
    if !(m2.is_finite() && m3.is_finite() && m4.is_finite()) || m2 <= f64::EPSILON {
        return None;
    }
    let skewness = m3 / m2.powf(1.5);
    let kurtosis = m4 / (m2 * m2) - 3.0;
    Some((skewness, kurtosis))
}

/// Skewness and excess kurtosis of a sample, using the same population
/// formulas as the engine-side moment query.
pub fn sample_moments(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    standardized_moments(m2 / n, m3 / n, m4 / n)
}

/// Linear-interpolated quantile of an ascending slice at position `p * (n - 1)`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let position = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = position - lower as f64;
            Some(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
        }
    }
}

/// Median absolute deviation from the median.
pub fn median_absolute_deviation(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    let median = quantile_sorted(&sorted, 0.5)?;
    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - median).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    quantile_sorted(&deviations, 0.5)
}

/// Shannon entropy in bits of a set of shares.
///
/// Shares are renormalized so that a truncated top-K list still yields a
/// proper distribution.
pub fn shannon_entropy(shares: &[f64]) -> f64 {
    let total: f64 = shares.iter().filter(|s| **s > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }
    shares
        .iter()
        .filter(|s| **s > 0.0)
        .map(|s| {
            let p = s / total;
            -p * p.log2()
        })
        .sum()
}

/// Tukey fences `(Q1 - 1.5 IQR, Q3 + 1.5 IQR)`.
pub fn tukey_fences(q25: f64, q75: f64) -> (f64, f64) {
    let iqr = q75 - q25;
    (q25 - 1.5 * iqr, q75 + 1.5 * iqr)
}

/// `bins + 1` equal-width edges over `[min, max]`.
///
/// Returns `None` when the range is empty or not finite, or when rounding
/// would produce edges that are not strictly increasing.
pub fn equal_width_edges(min: f64, max: f64, bins: usize) -> Option<Vec<f64>> {
    if bins == 0 || !min.is_finite() || !max.is_finite() || max <= min {
        return None;
    }
    let width = (max - min) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| min + width * i as f64).collect();
    edges.push(max);
    if edges.windows(2).all(|w| w[0] < w[1]) {
        Some(edges)
    } else {
        None
    }
}

/// Pearson's r from sufficient statistics, clamped to [-1, 1].
pub fn pearson_from_sums(
    n: f64,
    sum_x: f64,
    sum_y: f64,
    sum_x2: f64,
    sum_y2: f64,
    sum_xy: f64,
) -> Option<f64> {
    if n < 2.0 {
        return None;
    }
    let numerator = n * sum_xy - sum_x * sum_y;
    let var_x = n * sum_x2 - sum_x * sum_x;
    let var_y = n * sum_y2 - sum_y * sum_y;
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    let r = numerator / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Pearson's r of two equally long samples.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }
    pearson_from_sums(xs.len() as f64, sx, sy, sxx, syy, sxy)
}

/// Chi-square statistic and Cramer's V of a contingency table.
///
/// `counts[i][j]` is the joint count of row value `i` and column value `j`.
/// V is capped at 1.0. Returns `None` for tables with fewer than two rows or
/// columns, or with no observations.
pub fn cramers_v(counts: &[Vec<u64>]) -> Option<(f64, f64)> {
    let rows = counts.len();
    let cols = counts.iter().map(Vec::len).max().unwrap_or(0);
    if rows < 2 || cols < 2 {
        return None;
    }
    let row_totals: Vec<f64> = counts
        .iter()
        .map(|r| r.iter().sum::<u64>() as f64)
        .collect();
    let mut col_totals = vec![0.0; cols];
    for row in counts {
        for (j, c) in row.iter().enumerate() {
            col_totals[j] += *c as f64;
        }
    }
    let n: f64 = row_totals.iter().sum();
    if n <= 0.0 {
        return None;
    }

    let mut chi_square = 0.0;
    for (i, row) in counts.iter().enumerate() {
        for (j, col_total) in col_totals.iter().enumerate() {
            let expected = row_totals[i] * col_total / n;
            if expected > 0.0 {
                let observed = row.get(j).copied().unwrap_or(0) as f64;
                chi_square += (observed - expected).powi(2) / expected;
            }
        }
    }

    let occupied_rows = row_totals.iter().filter(|t| **t > 0.0).count();
    let occupied_cols = col_totals.iter().filter(|t| **t > 0.0).count();
    let k = occupied_rows.min(occupied_cols).saturating_sub(1);
    if k == 0 {
        return None;
    }
    let v = (chi_square / (n * k as f64)).sqrt().min(1.0);
    Some((chi_square, v))
}

/// Cohen's d between two groups using the pooled standard deviation.
pub fn cohens_d(n1: f64, mean1: f64, var1: f64, n2: f64, mean2: f64, var2: f64) -> Option<f64> {
    if n1 < 2.0 || n2 < 2.0 {
        return None;
    }
    let pooled = (((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / (n1 + n2 - 2.0)).sqrt();
    if !pooled.is_finite() || pooled <= f64::EPSILON {
        return None;
    }
    Some((mean1 - mean2) / pooled)
}

/// Classifies the shape of a numeric distribution.
///
/// A histogram with two separated peaks is bimodal. Otherwise the decision is
/// driven by skewness and excess kurtosis, with `min >= 0` required for the
/// exponential and power-law families.
pub fn detect_distribution(
    skewness: Option<f64>,
    kurtosis: Option<f64>,
    histogram: Option<&Histogram>,
    min: Option<f64>,
) -> DistributionFamily {
    if histogram.is_some_and(is_bimodal) {
        return DistributionFamily::Bimodal;
    }
    let (Some(skew), Some(kurt)) = (skewness, kurtosis) else {
        return DistributionFamily::Unknown;
    };
    let non_negative = min.is_some_and(|m| m >= 0.0);

    if skew.abs() < 0.5 && (kurt < -0.9 || histogram.is_some_and(is_roughly_flat)) {
        DistributionFamily::Uniform
    } else if skew.abs() < 0.5 && kurt.abs() < 1.0 {
        DistributionFamily::Normal
    } else if non_negative && skew > 2.5 && histogram.is_some_and(|h| leading_share(h, 2) >= 0.7) {
        DistributionFamily::PowerLaw
    } else if non_negative && (1.5..=2.5).contains(&skew) {
        DistributionFamily::Exponential
    } else if skew.abs() >= 0.5 {
        DistributionFamily::Skewed
    } else {
        DistributionFamily::Unknown
    }
}

/// Granularity and dominant gap of ascending distinct timestamps.
///
/// The granularity follows the most common delta between consecutive values;
/// the gap is reported only when that delta covers at least 80% of all deltas.
pub fn detect_temporal(sorted: &[DateTime<Utc>]) -> TemporalStats {
    let deltas: Vec<i64> = sorted
        .windows(2)
        .map(|w| w[1].signed_duration_since(w[0]).num_seconds())
        .filter(|d| *d > 0)
        .collect();
    if deltas.is_empty() {
        return TemporalStats {
            granularity: TimeGranularity::Irregular,
            dominant_gap_seconds: None,
        };
    }

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for d in &deltas {
        *counts.entry(*d).or_insert(0) += 1;
    }
    let (gap, hits) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .unwrap_or((0, 0));

    let granularity = match gap {
        d if d >= 360 * DAY_SECONDS && d <= 366 * DAY_SECONDS => TimeGranularity::Year,
        d if (28 * DAY_SECONDS..=31 * DAY_SECONDS).contains(&d) => TimeGranularity::Month,
        d if d % (7 * DAY_SECONDS) == 0 && d < 28 * DAY_SECONDS => TimeGranularity::Week,
        d if d % DAY_SECONDS == 0 && d < 28 * DAY_SECONDS => TimeGranularity::Day,
        d if d % HOUR_SECONDS == 0 && d < DAY_SECONDS => TimeGranularity::Hour,
        _ => TimeGranularity::Irregular,
    };
    let dominant = hits as f64 / deltas.len() as f64 >= DOMINANT_GAP_SHARE;
    TemporalStats {
        granularity,
        dominant_gap_seconds: dominant.then_some(gap),
    }
}

/// Share of the histogram mass in the first `n` bins.
fn leading_share(histogram: &Histogram, n: usize) -> f64 {
    let total = histogram.total();
    if total == 0 {
        return 0.0;
    }
    histogram.counts.iter().take(n).sum::<u64>() as f64 / total as f64
}

/// Every bin within a factor of 1.5 of every other.
fn is_roughly_flat(histogram: &Histogram) -> bool {
    let max = histogram.counts.iter().copied().max().unwrap_or(0);
    let min = histogram.counts.iter().copied().min().unwrap_or(0);
    min > 0 && max as f64 / min as f64 <= 1.5
}

/// Two peaks holding at least 5% of the mass each, separated by a valley
/// below half of the smaller peak.
fn is_bimodal(histogram: &Histogram) -> bool {
    let counts = &histogram.counts;
    let total = histogram.total();
    if counts.len() < 5 || total == 0 {
        return false;
    }
    let min_peak = (total as f64 * 0.05).max(1.0);
    let peaks: Vec<usize> = (0..counts.len())
        .filter(|&i| {
            let c = counts[i] as f64;
            let left = if i == 0 { 0 } else { counts[i - 1] };
            let right = counts.get(i + 1).copied().unwrap_or(0);
            c >= min_peak && counts[i] >= left && counts[i] > right
        })
        .collect();

    peaks.windows(2).any(|w| {
        let (a, b) = (w[0], w[1]);
        let valley = counts[a..=b].iter().copied().min().unwrap_or(0) as f64;
        let smaller = counts[a].min(counts[b]) as f64;
        b > a + 1 && valley < 0.5 * smaller
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist(counts: Vec<u64>) -> Histogram {
        let edges = (0..=counts.len()).map(|i| i as f64).collect();
        Histogram { edges, counts }
    }

    #[test]
    fn test_quantile_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(quantile_sorted(&values, 0.25), Some(2.0));
        assert_eq!(quantile_sorted(&values, 0.75), Some(4.0));
        assert_eq!(quantile_sorted(&values, 0.5), Some(3.0));
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert!((quantile_sorted(&[0.0, 10.0], 0.3).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_tukey_fences_flag_single_outlier() {
        let (lo, hi) = tukey_fences(2.0, 4.0);
        assert_eq!((lo, hi), (-1.0, 7.0));
        let outliers = [1.0, 2.0, 3.0, 4.0, 100.0]
            .iter()
            .filter(|v| **v < lo || **v > hi)
            .count();
        assert_eq!(outliers, 1);
    }

    #[test]
    fn test_moments() {
        let (skew, kurt) = sample_moments(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!(skew.abs() < 1e-12);
        assert!((kurt - (-1.3)).abs() < 1e-9);
        assert!(sample_moments(&[3.0, 3.0, 3.0]).is_none());

        let (skew, _) = sample_moments(&[1.0, 1.0, 1.0, 1.0, 10.0]).unwrap();
        assert!(skew > 1.0);
    }

    #[test]
    fn test_mad() {
        assert_eq!(median_absolute_deviation(&[1.0, 2.0, 3.0, 4.0, 100.0]), Some(1.0));
        assert_eq!(median_absolute_deviation(&[]), None);
    }

    #[test]
    fn test_entropy() {
        assert!((shannon_entropy(&[0.5, 0.5]) - 1.0).abs() < 1e-12);
        assert_eq!(shannon_entropy(&[1.0]), 0.0);
        assert!((shannon_entropy(&[25.0, 25.0, 25.0, 25.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_width_edges() {
        let edges = equal_width_edges(0.0, 10.0, 5).unwrap();
        assert_eq!(edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert!(equal_width_edges(1.0, 1.0, 5).is_none());
        assert!(equal_width_edges(0.0, f64::INFINITY, 5).is_none());
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn test_cramers_v() {
        let perfect = vec![vec![50, 0], vec![0, 50]];
        let (_, v) = cramers_v(&perfect).unwrap();
        assert!((v - 1.0).abs() < 1e-12);

        let independent = vec![vec![25, 25], vec![25, 25]];
        let (chi, v) = cramers_v(&independent).unwrap();
        assert!(chi.abs() < 1e-12);
        assert!(v.abs() < 1e-12);

        assert!(cramers_v(&[vec![10, 20]]).is_none());
    }

    #[test]
    fn test_cohens_d() {
        let d = cohens_d(10.0, 12.0, 4.0, 10.0, 10.0, 4.0).unwrap();
        assert!((d - 1.0).abs() < 1e-12);
        assert!(cohens_d(1.0, 1.0, 0.0, 10.0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_detect_distribution() {
        assert_eq!(
            detect_distribution(Some(0.1), Some(0.2), None, Some(-3.0)),
            DistributionFamily::Normal
        );
        assert_eq!(
            detect_distribution(Some(0.0), Some(-1.2), None, Some(0.0)),
            DistributionFamily::Uniform
        );
        assert_eq!(
            detect_distribution(Some(2.0), Some(6.0), None, Some(0.0)),
            DistributionFamily::Exponential
        );
        assert_eq!(
            detect_distribution(Some(2.0), Some(6.0), None, Some(-5.0)),
            DistributionFamily::Skewed
        );
        let heavy = hist(vec![80, 10, 4, 2, 1, 1, 1, 1]);
        assert_eq!(
            detect_distribution(Some(4.0), Some(30.0), Some(&heavy), Some(1.0)),
            DistributionFamily::PowerLaw
        );
        let two_peaks = hist(vec![2, 20, 30, 20, 2, 1, 2, 20, 30, 20, 2]);
        assert_eq!(
            detect_distribution(Some(0.0), Some(-1.5), Some(&two_peaks), Some(0.0)),
            DistributionFamily::Bimodal
        );
        assert_eq!(
            detect_distribution(None, None, None, None),
            DistributionFamily::Unknown
        );
    }

    #[test]
    fn test_detect_temporal() {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let daily: Vec<_> = (0..30).map(|i| start + chrono::Duration::days(i)).collect();
        let stats = detect_temporal(&daily);
        assert_eq!(stats.granularity, TimeGranularity::Day);
        assert_eq!(stats.dominant_gap_seconds, Some(DAY_SECONDS));

        let weekly: Vec<_> = (0..10).map(|i| start + chrono::Duration::weeks(i)).collect();
        assert_eq!(detect_temporal(&weekly).granularity, TimeGranularity::Week);

        let hourly: Vec<_> = (0..48).map(|i| start + chrono::Duration::hours(i)).collect();
        assert_eq!(detect_temporal(&hourly).granularity, TimeGranularity::Hour);

        let irregular = vec![
            start,
            start + chrono::Duration::seconds(17),
            start + chrono::Duration::seconds(1000),
        ];
        let stats = detect_temporal(&irregular);
        assert_eq!(stats.granularity, TimeGranularity::Irregular);
        assert_eq!(stats.dominant_gap_seconds, None);

        assert_eq!(detect_temporal(&[start]).granularity, TimeGranularity::Irregular);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(-0.1), 0.0);
    }
}
