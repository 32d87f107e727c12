//! Grouping of the valid dataset by (subject, condition).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::pipeline::config::{ConfigError, QcConfig};
use crate::quality::ValidDataset;

use super::statistics::{statistic_for, Statistic, StatisticKind};

/// One statistic for one (subject, condition) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    /// Subject identifier.
    pub subject: String,
    /// Condition identifier.
    pub condition: String,
    /// Which statistic this row holds.
    pub statistic: StatisticKind,
    /// The computed value; `None` if it is undefined for the group.
    pub value: Option<f64>,
    /// Number of trials that contributed.
    pub n_trials: usize,
}

/// Computes summary statistics per (subject, condition) group.
///
/// Grouping and statistics are independent: any [`Statistic`] can be plugged
/// in without touching the grouping.
#[derive(Clone)]
pub struct Aggregator {
    statistics: Vec<Arc<dyn Statistic>>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("statistics", &self.kinds())
            .finish()
    }
}

impl Aggregator {
    /// Creates an aggregator for the given statistics.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyStatistics` when `statistics` is empty.
    pub fn new(statistics: Vec<Arc<dyn Statistic>>) -> Result<Self, ConfigError> {
        if statistics.is_empty() {
            return Err(ConfigError::EmptyStatistics);
        }
        Ok(Self { statistics })
    }

    /// Creates an aggregator for the statistics requested in `config`.
    pub fn from_config(config: &QcConfig) -> Result<Self, ConfigError> {
        let statistics = config
            .statistics
            .iter()
            .map(|&kind| statistic_for(kind, config.trim_fraction).map(Arc::from))
            .collect::<Result<Vec<Arc<dyn Statistic>>, ConfigError>>()?;
        Self::new(statistics)
    }

    /// The statistic kinds computed, in output order.
    pub fn kinds(&self) -> Vec<StatisticKind> {
        self.statistics.iter().map(|s| s.kind()).collect()
    }

    /// Aggregates every (subject, condition) group in the dataset.
    ///
    /// Rows are ordered by subject, then condition, then statistic.
    pub fn aggregate(&self, dataset: &ValidDataset) -> Vec<AggregateResult> {
        let groups = group_by_subject_condition(dataset);

        let rows: Vec<AggregateResult> = groups
            .iter()
            .flat_map(|(&(subject, condition), values)| self.rows_for(subject, condition, values))
            .collect();

        info!(
            groups = groups.len(),
            rows = rows.len(),
            "Aggregation complete"
        );

        rows
    }

    /// Aggregates only the requested (subject, condition) pairs.
    ///
    /// Pairs absent from the dataset are omitted, never reported as zero.
    pub fn aggregate_pairs(
        &self,
        dataset: &ValidDataset,
        pairs: &[(String, String)],
    ) -> Vec<AggregateResult> {
        let groups = group_by_subject_condition(dataset);

        pairs
            .iter()
            .filter_map(|(subject, condition)| {
                groups
                    .get(&(subject.as_str(), condition.as_str()))
                    .map(|values| self.rows_for(subject, condition, values))
            })
            .flatten()
            .collect()
    }

    fn rows_for(&self, subject: &str, condition: &str, values: &[f64]) -> Vec<AggregateResult> {
        self.statistics
            .iter()
            .map(|statistic| AggregateResult {
                subject: subject.to_string(),
                condition: condition.to_string(),
                statistic: statistic.kind(),
                value: statistic.compute(values),
                n_trials: values.len(),
            })
            .collect()
    }
}

/// Groups reaction times by (subject, condition).
///
/// A group exists only if at least one trial contributes to it.
fn group_by_subject_condition(dataset: &ValidDataset) -> BTreeMap<(&str, &str), Vec<f64>> {
    let mut groups: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
    for trial in dataset.trials() {
        if let Some(rt) = trial.record.rt() {
            groups
                .entry((trial.subject(), trial.condition()))
                .or_default()
                .push(rt);
        }
    }
    groups
}
