//! Pipeline configuration.
//!
//! This module provides the configuration for the QC pipeline: trial-level
//! reaction-time bounds, the subject inclusion threshold, the statistics to
//! aggregate, and the parallelism cutoff. Every loader validates eagerly so
//! that no stage ever runs on an invalid configuration.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::StatisticKind;

/// Default lower reaction-time bound in milliseconds.
pub const DEFAULT_RT_MIN: f64 = 150.0;

/// Default upper reaction-time bound in milliseconds.
pub const DEFAULT_RT_MAX: f64 = 1500.0;

/// Default minimum number of valid trials for a subject to be included.
pub const DEFAULT_MIN_VALID_TRIALS: usize = 10;

/// Default input size at which trial QC switches to parallel evaluation.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10_000;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The reaction-time bounds are not finite or not strictly ordered.
    #[error("Invalid reaction-time bounds: rt_min ({rt_min}) must be finite and less than rt_max ({rt_max})")]
    InvalidBounds { rt_min: f64, rt_max: f64 },

    /// The trim fraction is outside `[0, 0.5)`.
    #[error("Invalid trim_fraction {0}: must satisfy 0 <= trim_fraction < 0.5")]
    InvalidTrimFraction(f64),

    /// `trimmed_mean` was requested without a trim fraction.
    #[error("trim_fraction is required when trimmed_mean is requested")]
    MissingTrimFraction,

    /// No statistics were requested.
    #[error("At least one statistic must be requested")]
    EmptyStatistics,

    /// An environment variable or option has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error while reading configuration.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration for the QC pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    // Trial-level QC
    /// Reaction times below this bound are rejected as too fast.
    pub rt_min: f64,
    /// Reaction times above this bound are rejected as too slow.
    pub rt_max: f64,

    // Subject-level QC
    /// Minimum number of valid trials for a subject to be included.
    pub min_valid_trials: usize,

    // Aggregation
    /// Statistics computed for every (subject, condition) group.
    pub statistics: BTreeSet<StatisticKind>,
    /// Fraction cut from each tail for `trimmed_mean`.
    pub trim_fraction: Option<f64>,

    // Execution
    /// Number of trials at which trial QC runs on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            rt_min: DEFAULT_RT_MIN,
            rt_max: DEFAULT_RT_MAX,
            min_valid_trials: DEFAULT_MIN_VALID_TRIALS,
            statistics: [StatisticKind::Median, StatisticKind::Mean]
                .into_iter()
                .collect(),
            trim_fraction: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl QcConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TRIALQC_RT_MIN`: Lower RT bound in ms (default: 150)
    /// - `TRIALQC_RT_MAX`: Upper RT bound in ms (default: 1500)
    /// - `TRIALQC_MIN_VALID_TRIALS`: Subject inclusion threshold (default: 10)
    /// - `TRIALQC_STATISTICS`: Comma-separated statistics (default: mean,median)
    /// - `TRIALQC_TRIM_FRACTION`: Trim fraction for trimmed_mean (default: unset)
    /// - `TRIALQC_PARALLEL_THRESHOLD`: Parallel trial QC cutoff (default: 10000)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the resulting
    /// configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::load_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the `TRIALQC_*` variables over the defaults without validating.
    ///
    /// Use this when more layers are applied before [`QcConfig::validate`].
    pub fn load_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TRIALQC_RT_MIN") {
            config.rt_min = parse_env_value(&val, "TRIALQC_RT_MIN")?;
        }

        if let Ok(val) = std::env::var("TRIALQC_RT_MAX") {
            config.rt_max = parse_env_value(&val, "TRIALQC_RT_MAX")?;
        }

        if let Ok(val) = std::env::var("TRIALQC_MIN_VALID_TRIALS") {
            config.min_valid_trials = parse_env_value(&val, "TRIALQC_MIN_VALID_TRIALS")?;
        }

        if let Ok(val) = std::env::var("TRIALQC_STATISTICS") {
            config.statistics = parse_statistics(&val, "TRIALQC_STATISTICS")?;
        }

        if let Ok(val) = std::env::var("TRIALQC_TRIM_FRACTION") {
            config.trim_fraction = Some(parse_env_value(&val, "TRIALQC_TRIM_FRACTION")?);
        }

        if let Ok(val) = std::env::var("TRIALQC_PARALLEL_THRESHOLD") {
            config.parallel_threshold = parse_env_value(&val, "TRIALQC_PARALLEL_THRESHOLD")?;
        }

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::load_yaml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::load_yaml_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML file over the defaults without validating.
    pub fn load_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_yaml_str(&content)
    }

    /// Parses YAML over the defaults without validating.
    pub fn load_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_bounds(self.rt_min, self.rt_max)?;

        if self.statistics.is_empty() {
            return Err(ConfigError::EmptyStatistics);
        }

        if let Some(fraction) = self.trim_fraction {
            check_trim_fraction(fraction)?;
        }

        if self.statistics.contains(&StatisticKind::TrimmedMean) && self.trim_fraction.is_none() {
            return Err(ConfigError::MissingTrimFraction);
        }

        Ok(())
    }

    /// Builder method to set the reaction-time bounds.
    pub fn with_rt_bounds(mut self, rt_min: f64, rt_max: f64) -> Self {
        self.rt_min = rt_min;
        self.rt_max = rt_max;
        self
    }

    /// Builder method to set the subject inclusion threshold.
    pub fn with_min_valid_trials(mut self, min: usize) -> Self {
        self.min_valid_trials = min;
        self
    }

    /// Builder method to replace the requested statistics.
    pub fn with_statistics(mut self, statistics: impl IntoIterator<Item = StatisticKind>) -> Self {
        self.statistics = statistics.into_iter().collect();
        self
    }

    /// Builder method to set the trim fraction.
    pub fn with_trim_fraction(mut self, fraction: f64) -> Self {
        self.trim_fraction = Some(fraction);
        self
    }

    /// Builder method to set the parallel trial QC cutoff.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

/// Checks that `rt_min < rt_max` and both are finite.
pub(crate) fn check_bounds(rt_min: f64, rt_max: f64) -> Result<(), ConfigError> {
    if !rt_min.is_finite() || !rt_max.is_finite() || rt_min >= rt_max {
        return Err(ConfigError::InvalidBounds { rt_min, rt_max });
    }
    Ok(())
}

/// Checks that `0 <= fraction < 0.5`.
pub(crate) fn check_trim_fraction(fraction: f64) -> Result<(), ConfigError> {
    if !(0.0..0.5).contains(&fraction) {
        return Err(ConfigError::InvalidTrimFraction(fraction));
    }
    Ok(())
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse a comma-separated list of statistic names.
fn parse_statistics(value: &str, key: &str) -> Result<BTreeSet<StatisticKind>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_env_value(s, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QcConfig::default();
        assert!((config.rt_min - 150.0).abs() < f64::EPSILON);
        assert!((config.rt_max - 1500.0).abs() < f64::EPSILON);
        assert_eq!(config.min_valid_trials, 10);
        assert!(config.statistics.contains(&StatisticKind::Mean));
        assert!(config.statistics.contains(&StatisticKind::Median));
        assert!(config.trim_fraction.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = QcConfig::new()
            .with_rt_bounds(100.0, 2000.0)
            .with_min_valid_trials(5)
            .with_statistics([StatisticKind::TrimmedMean])
            .with_trim_fraction(0.1)
            .with_parallel_threshold(64);

        assert!((config.rt_min - 100.0).abs() < f64::EPSILON);
        assert!((config.rt_max - 2000.0).abs() < f64::EPSILON);
        assert_eq!(config.min_valid_trials, 5);
        assert_eq!(config.statistics.len(), 1);
        assert_eq!(config.trim_fraction, Some(0.1));
        assert_eq!(config.parallel_threshold, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bounds() {
        let equal = QcConfig::new().with_rt_bounds(500.0, 500.0);
        assert!(matches!(
            equal.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));

        let reversed = QcConfig::new().with_rt_bounds(1500.0, 150.0);
        assert!(matches!(
            reversed.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));

        let nan = QcConfig::new().with_rt_bounds(f64::NAN, 150.0);
        assert!(matches!(nan.validate(), Err(ConfigError::InvalidBounds { .. })));
    }

    #[test]
    fn test_validation_empty_statistics() {
        let config = QcConfig::new().with_statistics(Vec::<StatisticKind>::new());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyStatistics)
        ));
    }

    #[test]
    fn test_validation_trim_fraction() {
        let missing = QcConfig::new().with_statistics([StatisticKind::TrimmedMean]);
        assert!(matches!(
            missing.validate(),
            Err(ConfigError::MissingTrimFraction)
        ));

        let half = QcConfig::new()
            .with_statistics([StatisticKind::TrimmedMean])
            .with_trim_fraction(0.5);
        assert!(matches!(
            half.validate(),
            Err(ConfigError::InvalidTrimFraction(_))
        ));

        let negative = QcConfig::new().with_trim_fraction(-0.1);
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::InvalidTrimFraction(_))
        ));

        // Accepted without trimmed_mean; it is simply unused.
        let unused = QcConfig::new().with_trim_fraction(0.2);
        assert!(unused.validate().is_ok());

        let zero = QcConfig::new()
            .with_statistics([StatisticKind::TrimmedMean])
            .with_trim_fraction(0.0);
        assert!(zero.validate().is_ok());
    }

    #[test]
    fn test_statistics_are_a_set() {
        let config = QcConfig::new().with_statistics([
            StatisticKind::Mean,
            StatisticKind::Mean,
            StatisticKind::Median,
        ]);
        assert_eq!(config.statistics.len(), 2);
    }

    #[test]
    fn test_parse_statistics() {
        let parsed = parse_statistics("mean, trimmed_mean,,median", "KEY").expect("parses");
        assert_eq!(parsed.len(), 3);
        assert!(parsed.contains(&StatisticKind::TrimmedMean));

        let err = parse_statistics("mean,mode", "KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_yaml_str() {
        let config = QcConfig::from_yaml_str(
            "rt_min: 200\nrt_max: 1200\nstatistics: [trimmed_mean, median]\ntrim_fraction: 0.2\n",
        )
        .expect("valid yaml");
        assert!((config.rt_min - 200.0).abs() < f64::EPSILON);
        assert_eq!(config.min_valid_trials, DEFAULT_MIN_VALID_TRIALS);
        assert!(config.statistics.contains(&StatisticKind::TrimmedMean));
        assert_eq!(config.trim_fraction, Some(0.2));
    }

    /// Serializes tests that touch the process environment.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    const ENV_KEYS: [&str; 6] = [
        "TRIALQC_RT_MIN",
        "TRIALQC_RT_MAX",
        "TRIALQC_MIN_VALID_TRIALS",
        "TRIALQC_STATISTICS",
        "TRIALQC_TRIM_FRACTION",
        "TRIALQC_PARALLEL_THRESHOLD",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_from_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var("TRIALQC_RT_MIN", "200");
        std::env::set_var("TRIALQC_RT_MAX", " 1200 ");
        std::env::set_var("TRIALQC_MIN_VALID_TRIALS", "4");
        std::env::set_var("TRIALQC_STATISTICS", "median, trimmed_mean");
        std::env::set_var("TRIALQC_TRIM_FRACTION", "0.1");
        std::env::set_var("TRIALQC_PARALLEL_THRESHOLD", "128");

        let result = QcConfig::from_env();
        clear_env();

        let config = result.expect("valid environment");
        assert!((config.rt_min - 200.0).abs() < f64::EPSILON);
        assert!((config.rt_max - 1200.0).abs() < f64::EPSILON);
        assert_eq!(config.min_valid_trials, 4);
        assert_eq!(
            config.statistics.iter().copied().collect::<Vec<_>>(),
            vec![StatisticKind::Median, StatisticKind::TrimmedMean]
        );
        assert_eq!(config.trim_fraction, Some(0.1));
        assert_eq!(config.parallel_threshold, 128);
    }

    #[test]
    fn test_from_env_defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = QcConfig::from_env().expect("defaults are valid");
        assert_eq!(config, QcConfig::default());
    }

    #[test]
    fn test_from_env_invalid_value() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var("TRIALQC_MIN_VALID_TRIALS", "ten");
        let result = QcConfig::from_env();
        clear_env();

        match result {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "TRIALQC_MIN_VALID_TRIALS")
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_load_env_defers_validation() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        std::env::set_var("TRIALQC_STATISTICS", "trimmed_mean");
        let loaded = QcConfig::load_env();
        let validated = QcConfig::from_env();
        clear_env();

        let loaded = loaded.expect("parses without validating");
        assert!(loaded.statistics.contains(&StatisticKind::TrimmedMean));
        assert!(matches!(loaded.validate(), Err(ConfigError::MissingTrimFraction)));
        assert!(matches!(validated, Err(ConfigError::MissingTrimFraction)));
    }

    #[test]
    fn test_load_yaml_str_defers_validation() {
        let config = QcConfig::load_yaml_str("rt_min: 2000\n").expect("parses");
        assert!((config.rt_min - 2000.0).abs() < f64::EPSILON);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_from_yaml_str_rejects_invalid() {
        let result = QcConfig::from_yaml_str("rt_min: 2000\nrt_max: 100\n");
        assert!(matches!(result, Err(ConfigError::InvalidBounds { .. })));

        let result = QcConfig::from_yaml_str("statistics: []\n");
        assert!(matches!(result, Err(ConfigError::EmptyStatistics)));
    }
}
