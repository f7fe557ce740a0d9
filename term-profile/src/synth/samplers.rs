//! Random variates for numeric and temporal columns.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::profile::types::{DistributionFamily, Histogram, TimeGranularity};

/// A standard normal variate by the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - u lies in (0, 1], so the logarithm is finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Picks a bin by count and draws uniformly inside it.
#[derive(Debug, Clone)]
pub struct HistogramSampler {
    edges: Vec<f64>,
    index: WeightedIndex<u64>,
}

impl HistogramSampler {
    /// `None` when the histogram is empty or malformed.
    pub fn new(histogram: &Histogram) -> Option<Self> {
        if histogram.edges.len() != histogram.counts.len() + 1 || histogram.total() == 0 {
            return None;
        }
        let index = WeightedIndex::new(histogram.counts.iter().copied()).ok()?;
        Some(Self {
            edges: histogram.edges.clone(),
            index,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let bin = self.index.sample(rng);
        let (lo, hi) = (self.edges[bin], self.edges[bin + 1]);
        lo + rng.random::<f64>() * (hi - lo)
    }
}

/// Parameters of a distribution family fitted from profile statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum FamilySampler {
    Normal { mean: f64, std_dev: f64 },
    Uniform { min: f64, max: f64 },
    /// Exponential shifted to `min` with mean `min + scale`.
    Exponential { min: f64, scale: f64 },
    /// Cubic transform of a standard normal, scaled to mean and spread.
    Skewed { mean: f64, std_dev: f64, skewness: f64 },
    /// Equal mixture of two normals split at the median.
    Bimodal { low: (f64, f64), high: (f64, f64) },
    /// Pareto with scale `x_min` and shape `alpha`.
    PowerLaw { x_min: f64, alpha: f64 },
}

impl FamilySampler {
    /// Fits the family from summary statistics, degrading to normal and then
    /// uniform when the statistics it needs are missing.
    pub fn fit(
        family: DistributionFamily,
        mean: Option<f64>,
        std_dev: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
        median: Option<f64>,
        skewness: Option<f64>,
    ) -> Option<Self> {
        let fitted = match family {
            DistributionFamily::Uniform => Some(Self::Uniform {
                min: min?,
                max: max?,
            }),
            DistributionFamily::Exponential => match (min, mean) {
                (Some(min), Some(mean)) if mean > min => Some(Self::Exponential {
                    min,
                    scale: mean - min,
                }),
                _ => None,
            },
            DistributionFamily::Skewed => match (mean, std_dev, skewness) {
                (Some(mean), Some(std_dev), Some(skewness)) => Some(Self::Skewed {
                    mean,
                    std_dev,
                    skewness,
                }),
                _ => None,
            },
            DistributionFamily::Bimodal => match (min, median, max) {
                (Some(min), Some(median), Some(max)) if min < median && median < max => {
                    Some(Self::Bimodal {
                        low: ((min + median) / 2.0, (median - min) / 4.0),
                        high: ((median + max) / 2.0, (max - median) / 4.0),
                    })
                }
                _ => None,
            },
            DistributionFamily::PowerLaw => match (min, mean) {
                (Some(min), Some(mean)) if min > 0.0 && mean > min => Some(Self::PowerLaw {
                    x_min: min,
                    alpha: (mean / (mean - min)).max(1.0 + f64::EPSILON),
                }),
                _ => None,
            },
            DistributionFamily::Normal | DistributionFamily::Unknown => None,
        };

        fitted
            .or_else(|| match (mean, std_dev) {
                (Some(mean), Some(std_dev)) => Some(Self::Normal { mean, std_dev }),
                _ => None,
            })
            .or_else(|| match (min, max) {
                (Some(min), Some(max)) => Some(Self::Uniform { min, max }),
                _ => None,
            })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Normal { mean, std_dev } => mean + std_dev * standard_normal(rng),
            Self::Uniform { min, max } => min + rng.random::<f64>() * (max - min),
            Self::Exponential { min, scale } => {
                let u: f64 = 1.0 - rng.random::<f64>();
                min - scale * u.ln()
            }
            Self::Skewed {
                mean,
                std_dev,
                skewness,
            } => {
                let z = standard_normal(rng);
                let c = (skewness / 6.0).clamp(-1.0, 1.0);
                // Second-order Fleishman-style transform: zero mean by construction.
                let y = z + c * (z * z - 1.0);
                let scale = (1.0 + 2.0 * c * c).sqrt();
                mean + std_dev * y / scale
            }
            Self::Bimodal { low, high } => {
                let (center, spread) = if rng.random_bool(0.5) { low } else { high };
                center + spread * standard_normal(rng)
            }
            Self::PowerLaw { x_min, alpha } => {
                let u: f64 = 1.0 - rng.random::<f64>();
                x_min / u.powf(1.0 / alpha)
            }
        }
    }
}

/// Floors a timestamp to the start of its granularity period.
pub fn truncate_to(ts: DateTime<Utc>, granularity: TimeGranularity) -> DateTime<Utc> {
    let day_start = |d: DateTime<Utc>| {
        Utc.with_ymd_and_hms(d.year(), d.month(), d.day(), 0, 0, 0)
            .single()
            .unwrap_or(d)
    };
    match granularity {
        TimeGranularity::Year => Utc
            .with_ymd_and_hms(ts.year(), 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(ts),
        TimeGranularity::Month => Utc
            .with_ymd_and_hms(ts.year(), ts.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(ts),
        TimeGranularity::Week => {
            let back = i64::from(ts.weekday().num_days_from_monday());
            day_start(ts) - Duration::days(back)
        }
        TimeGranularity::Day => day_start(ts),
        TimeGranularity::Hour => Utc
            .with_ymd_and_hms(ts.year(), ts.month(), ts.day(), ts.hour(), 0, 0)
            .single()
            .unwrap_or(ts),
        TimeGranularity::Irregular => ts,
    }
}

/// Snaps `ts` down onto the grid `origin + k * gap_seconds`.
pub fn snap_to_gap(ts: DateTime<Utc>, origin: DateTime<Utc>, gap_seconds: i64) -> DateTime<Utc> {
    if gap_seconds <= 0 || ts <= origin {
        return origin;
    }
    let offset = (ts - origin).num_seconds();
    origin + Duration::seconds(offset - offset % gap_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn moments(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(11);
        let values: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let (mean, std) = moments(&values);
        assert!(mean.abs() < 0.05);
        assert!((std - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_histogram_sampler_stays_in_populated_bins() {
        let histogram = Histogram {
            edges: vec![0.0, 1.0, 2.0, 3.0],
            counts: vec![0, 10, 0],
        };
        let sampler = HistogramSampler::new(&histogram).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let v = sampler.sample(&mut rng);
            assert!((1.0..=2.0).contains(&v));
        }
        let empty = Histogram {
            edges: vec![0.0, 1.0],
            counts: vec![0],
        };
        assert!(HistogramSampler::new(&empty).is_none());
    }

    #[test]
    fn test_family_fit_fallbacks() {
        let normal = FamilySampler::fit(
            DistributionFamily::Exponential,
            Some(5.0),
            Some(2.0),
            Some(10.0),
            Some(20.0),
            None,
            None,
        );
        assert_eq!(
            normal,
            Some(FamilySampler::Normal {
                mean: 5.0,
                std_dev: 2.0
            })
        );
        let uniform = FamilySampler::fit(
            DistributionFamily::Unknown,
            None,
            None,
            Some(1.0),
            Some(2.0),
            None,
            None,
        );
        assert_eq!(uniform, Some(FamilySampler::Uniform { min: 1.0, max: 2.0 }));
        assert!(FamilySampler::fit(
            DistributionFamily::Normal,
            None,
            None,
            None,
            None,
            None,
            None
        )
        .is_none());
    }

    #[test]
    fn test_exponential_and_power_law_support() {
        let mut rng = StdRng::seed_from_u64(5);
        let exp = FamilySampler::Exponential {
            min: 2.0,
            scale: 3.0,
        };
        let values: Vec<f64> = (0..10_000).map(|_| exp.sample(&mut rng)).collect();
        assert!(values.iter().all(|v| *v >= 2.0));
        assert!((moments(&values).0 - 5.0).abs() < 0.2);

        let pareto = FamilySampler::PowerLaw {
            x_min: 1.0,
            alpha: 3.0,
        };
        assert!((0..1000).all(|_| pareto.sample(&mut rng) >= 1.0));
    }

    #[test]
    fn test_skewed_sampler_direction() {
        let mut rng = StdRng::seed_from_u64(9);
        let sampler = FamilySampler::Skewed {
            mean: 0.0,
            std_dev: 1.0,
            skewness: 3.0,
        };
        let values: Vec<f64> = (0..20_000).map(|_| sampler.sample(&mut rng)).collect();
        let (mean, std) = moments(&values);
        let skew = values.iter().map(|v| ((v - mean) / std).powi(3)).sum::<f64>()
            / values.len() as f64;
        assert!(mean.abs() < 0.05);
        assert!(skew > 1.0);
    }

    #[test]
    fn test_time_truncation() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 16, 13, 45, 10).unwrap();
        assert_eq!(
            truncate_to(ts, TimeGranularity::Month),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
        // 2024-05-16 is a Thursday.
        assert_eq!(
            truncate_to(ts, TimeGranularity::Week),
            Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap()
        );
        assert_eq!(
            truncate_to(ts, TimeGranularity::Hour),
            Utc.with_ymd_and_hms(2024, 5, 16, 13, 0, 0).unwrap()
        );

        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            snap_to_gap(ts, origin, 7 * 86_400),
            Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap()
        );
    }
}
