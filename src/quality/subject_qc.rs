//! Subject-level quality control.
//!
//! Counts valid trials per subject and includes a subject only when the
//! count reaches the configured minimum.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::pipeline::config::{QcConfig, DEFAULT_PARALLEL_THRESHOLD};
use crate::trial::AnnotatedTrial;

/// Inclusion decision for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectQcResult {
    /// Subject identifier.
    pub subject: String,
    /// Number of the subject's trials that passed trial-level QC.
    pub n_valid_trials: usize,
    /// Whether the subject is kept for aggregation.
    pub included: bool,
}

/// Decides subject inclusion from annotated trials.
#[derive(Debug, Clone)]
pub struct SubjectQcEvaluator {
    min_valid_trials: usize,
    parallel_threshold: usize,
}

impl SubjectQcEvaluator {
    /// Creates an evaluator with the given inclusion threshold.
    pub fn new(min_valid_trials: usize) -> Self {
        Self {
            min_valid_trials,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Creates an evaluator from a pipeline configuration.
    pub fn from_config(config: &QcConfig) -> Self {
        Self::new(config.min_valid_trials).with_parallel_threshold(config.parallel_threshold)
    }

    /// Sets the input size at which counting runs in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// The inclusion threshold.
    pub fn min_valid_trials(&self) -> usize {
        self.min_valid_trials
    }

    /// Produces one result per subject present in `trials`, sorted by subject.
    ///
    /// Subjects whose trials were all rejected appear with a count of zero.
    pub fn evaluate(&self, trials: &[AnnotatedTrial]) -> Vec<SubjectQcResult> {
        let counts = self.count_valid(trials);

        let results: Vec<SubjectQcResult> = counts
            .into_iter()
            .map(|(subject, n_valid_trials)| SubjectQcResult {
                subject: subject.to_string(),
                n_valid_trials,
                included: n_valid_trials >= self.min_valid_trials,
            })
            .collect();

        for result in results.iter().filter(|r| !r.included) {
            debug!(
                subject = %result.subject,
                n_valid_trials = result.n_valid_trials,
                min_valid_trials = self.min_valid_trials,
                "Subject excluded"
            );
        }
        info!(
            subjects = results.len(),
            included = results.iter().filter(|r| r.included).count(),
            "Subject QC evaluated"
        );

        results
    }

    /// Counts valid trials per subject.
    ///
    /// Large inputs are counted in per-worker partial maps that are merged
    /// before any inclusion decision is made.
    fn count_valid<'a>(&self, trials: &'a [AnnotatedTrial]) -> BTreeMap<&'a str, usize> {
        if trials.len() < self.parallel_threshold {
            return trials.iter().fold(BTreeMap::new(), tally);
        }

        trials
            .par_iter()
            .fold(BTreeMap::new, tally)
            .reduce(BTreeMap::new, |mut merged, partial| {
                for (subject, count) in partial {
                    *merged.entry(subject).or_insert(0) += count;
                }
                merged
            })
    }
}

fn tally<'a>(
    mut counts: BTreeMap<&'a str, usize>,
    trial: &'a AnnotatedTrial,
) -> BTreeMap<&'a str, usize> {
    let count = counts.entry(trial.subject()).or_insert(0);
    if trial.is_valid() {
        *count += 1;
    }
    counts
}

/// Collects the identifiers of included subjects.
pub fn included_subjects(results: &[SubjectQcResult]) -> BTreeSet<String> {
    results
        .iter()
        .filter(|r| r.included)
        .map(|r| r.subject.clone())
        .collect()
}
