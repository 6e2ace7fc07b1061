//! Time-bucket downsampling
//!
//! Historical dashboard queries would otherwise return up to a full day of
//! samples per sensor. Instead the time range of a series is split into a
//! fixed number of equal-width buckets and each non-empty bucket is reduced
//! to a single point with an aggregate function.
//!
//! Bucket edges are `min + i * (max - min) / n` for `i = 0..=n`. Every bucket
//! is half-open `[edge[i], edge[i+1])` except the last, which also includes
//! `max`. A bucket is reported at its left edge. Empty buckets are skipped,
//! and so are buckets whose aggregate is NaN or infinite.

use crate::error::{Result, SensorlineError};
use std::str::FromStr;

/// Aggregate function applied to the values of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregate {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Middle value (mean of the two middle values for even counts)
    Median,
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// Sum of values
    Sum,
    /// Number of values
    Count,
    /// Population standard deviation
    Std,
}

impl Aggregate {
    /// Name accepted by [`Aggregate::from_str`]
    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Mean => "mean",
            Aggregate::Median => "median",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Sum => "sum",
            Aggregate::Count => "count",
            Aggregate::Std => "std",
        }
    }

    /// Get all aggregates
    pub fn all() -> &'static [Aggregate] {
        &[
            Aggregate::Mean,
            Aggregate::Median,
            Aggregate::Min,
            Aggregate::Max,
            Aggregate::Sum,
            Aggregate::Count,
            Aggregate::Std,
        ]
    }

    /// Reduce a non-empty slice of values
    ///
    /// Sums run in slice order so results are reproducible bit for bit.
    pub fn apply(&self, values: &[f64]) -> f64 {
        let n = values.len() as f64;
        match self {
            Aggregate::Mean => values.iter().sum::<f64>() / n,
            Aggregate::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Sum => values.iter().sum(),
            Aggregate::Count => n,
            Aggregate::Std => {
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                variance.sqrt()
            }
        }
    }
}

impl FromStr for Aggregate {
    type Err = SensorlineError;

    fn from_str(s: &str) -> Result<Self> {
        Aggregate::all()
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| SensorlineError::UnknownAggregate(s.to_string()))
    }
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bucket a `(time, value)` series and aggregate each bucket
///
/// Returns `(left_edge, aggregate)` for every non-empty bucket with a finite
/// aggregate, in ascending time order. Fewer than two samples, or zero buckets, yield an empty result.
pub fn downsample(series: &[(f64, f64)], aggregate: Aggregate, bucket_count: usize) -> Vec<(f64, f64)> {
    if series.len() < 2 || bucket_count == 0 {
        return Vec::new();
    }

    let (mut lo, mut hi) = series
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (t, _)| {
            (lo.min(*t), hi.max(*t))
        });
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let edges = bucket_edges(lo, hi, bucket_count);
    let interior = &edges[1..bucket_count];

    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); bucket_count];
    for (t, v) in series {
        let index = interior.partition_point(|edge| *edge <= *t);
        buckets[index].push(*v);
    }

    buckets
        .iter()
        .enumerate()
        .filter(|(_, values)| !values.is_empty())
        .map(|(i, values)| (edges[i], aggregate.apply(values)))
        .filter(|(_, value)| value.is_finite())
        .collect()
}

/// Downsample with an aggregate selected by name
pub fn downsample_by_name(
    series: &[(f64, f64)],
    aggregate: &str,
    bucket_count: usize,
) -> Result<Vec<(f64, f64)>> {
    let aggregate = aggregate.parse::<Aggregate>()?;
    Ok(downsample(series, aggregate, bucket_count))
}

/// `n + 1` equally spaced edges from `lo` to `hi`, last edge exactly `hi`
fn bucket_edges(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let width = (hi - lo) / n as f64;
    let mut edges: Vec<f64> = (0..n).map(|i| lo + i as f64 * width).collect();
    edges.push(hi);
    edges
}
