//! Summary statistics over reaction-time samples.
//!
//! Each statistic implements [`Statistic`] and knows nothing about grouping;
//! the [`Aggregator`](super::Aggregator) hands it one group's values at a time.

use serde::{Deserialize, Serialize};

use crate::pipeline::config::{check_trim_fraction, ConfigError};

/// The kinds of statistic the aggregator can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    /// Arithmetic mean.
    Mean,
    /// 50th percentile, averaging the two middle values for even sizes.
    Median,
    /// Mean after cutting a fixed fraction from each tail.
    TrimmedMean,
}

impl StatisticKind {
    /// Returns the name used in configuration and outputs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::Mean => "mean",
            StatisticKind::Median => "median",
            StatisticKind::TrimmedMean => "trimmed_mean",
        }
    }
}

impl std::fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StatisticKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "mean" => Ok(StatisticKind::Mean),
            "median" => Ok(StatisticKind::Median),
            "trimmed_mean" => Ok(StatisticKind::TrimmedMean),
            other => Err(ConfigError::InvalidValue {
                key: "statistics".to_string(),
                message: format!(
                    "unknown statistic '{}': expected mean, median or trimmed_mean",
                    other
                ),
            }),
        }
    }
}

/// A statistic computed over one group of reaction times.
pub trait Statistic: Send + Sync {
    /// The kind reported in aggregate rows.
    fn kind(&self) -> StatisticKind;

    /// Computes the statistic, or `None` when `values` is empty.
    fn compute(&self, values: &[f64]) -> Option<f64>;
}

/// Arithmetic mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Statistic for Mean {
    fn kind(&self) -> StatisticKind {
        StatisticKind::Mean
    }

    fn compute(&self, values: &[f64]) -> Option<f64> {
        mean(values)
    }
}

/// Median of the sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl Statistic for Median {
    fn kind(&self) -> StatisticKind {
        StatisticKind::Median
    }

    fn compute(&self, values: &[f64]) -> Option<f64> {
        let sorted = sorted(values);
        let n = sorted.len();
        if n == 0 {
            return None;
        }
        let mid = n / 2;
        if n % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }
}

/// Mean of the sample after removing `floor(n * trim_fraction)` values from
/// each end of the sorted sample.
#[derive(Debug, Clone, Copy)]
pub struct TrimmedMean {
    trim_fraction: f64,
}

impl TrimmedMean {
    /// Creates a trimmed mean.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTrimFraction` unless `0 <= trim_fraction < 0.5`.
    pub fn new(trim_fraction: f64) -> Result<Self, ConfigError> {
        check_trim_fraction(trim_fraction)?;
        Ok(Self { trim_fraction })
    }

    /// The fraction cut from each tail.
    pub fn trim_fraction(&self) -> f64 {
        self.trim_fraction
    }
}

impl Statistic for TrimmedMean {
    fn kind(&self) -> StatisticKind {
        StatisticKind::TrimmedMean
    }

    fn compute(&self, values: &[f64]) -> Option<f64> {
        let sorted = sorted(values);
        let n = sorted.len();
        // trim_fraction < 0.5 keeps at least one value for any n >= 1
        let cut = (n as f64 * self.trim_fraction).floor() as usize;
        mean(&sorted[cut..n - cut])
    }
}

/// Builds the statistic for `kind`.
///
/// # Errors
///
/// Returns `ConfigError::MissingTrimFraction` when `kind` is `TrimmedMean`
/// and no fraction is given, or `InvalidTrimFraction` when it is out of range.
pub fn statistic_for(
    kind: StatisticKind,
    trim_fraction: Option<f64>,
) -> Result<Box<dyn Statistic>, ConfigError> {
    match kind {
        StatisticKind::Mean => Ok(Box::new(Mean)),
        StatisticKind::Median => Ok(Box::new(Median)),
        StatisticKind::TrimmedMean => {
            let fraction = trim_fraction.ok_or(ConfigError::MissingTrimFraction)?;
            Ok(Box::new(TrimmedMean::new(fraction)?))
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}
