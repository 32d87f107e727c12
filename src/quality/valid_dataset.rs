//! Construction of the valid dataset.
//!
//! The valid dataset holds trials that passed trial-level QC and belong to an
//! included subject. It can only be built here, and it is the only input the
//! aggregator accepts.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use crate::trial::AnnotatedTrial;

/// Trials eligible for aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidDataset {
    trials: Vec<AnnotatedTrial>,
    excluded_by_subject: Vec<u64>,
}

impl ValidDataset {
    /// The eligible trials, in input order.
    pub fn trials(&self) -> &[AnnotatedTrial] {
        &self.trials
    }

    /// Ids of trials that passed trial-level QC but were dropped because
    /// their subject was excluded.
    pub fn excluded_by_subject(&self) -> &[u64] {
        &self.excluded_by_subject
    }

    /// Number of eligible trials.
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    /// True when no trial is eligible.
    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Distinct subjects with at least one eligible trial.
    pub fn subjects(&self) -> BTreeSet<&str> {
        self.trials.iter().map(|t| t.subject()).collect()
    }
}

/// Filters annotated trials down to the valid dataset.
pub struct ValidDatasetBuilder;

impl ValidDatasetBuilder {
    /// Keeps trials with `qc_flag == true` whose subject is in `included`.
    ///
    /// An empty `included` set yields an empty dataset.
    pub fn build(trials: &[AnnotatedTrial], included: &BTreeSet<String>) -> ValidDataset {
        let mut dataset = ValidDataset::default();

        for trial in trials.iter().filter(|t| t.is_valid()) {
            if included.contains(trial.subject()) {
                dataset.trials.push(trial.clone());
            } else {
                dataset.excluded_by_subject.push(trial.trial_id());
            }
        }

        info!(
            valid_trials = dataset.trials.len(),
            excluded_by_subject = dataset.excluded_by_subject.len(),
            "Valid dataset built"
        );

        dataset
    }
}
