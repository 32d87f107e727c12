//! Trial-level quality control.
//!
//! Applies fixed reaction-time rules to each trial in order, first match wins:
//! missing, negative, too fast, too slow, otherwise valid.

use rayon::prelude::*;
use tracing::debug;

use crate::pipeline::config::{check_bounds, ConfigError, QcConfig, DEFAULT_PARALLEL_THRESHOLD};
use crate::trial::{AnnotatedTrial, QcAnnotation, QcReason, TrialRecord};

/// Flags each trial as valid or rejected with a reason.
///
/// Evaluation of one trial never depends on another, so large inputs are
/// split across the rayon pool. Output order always equals input order.
#[derive(Debug, Clone)]
pub struct TrialQcEvaluator {
    rt_min: f64,
    rt_max: f64,
    parallel_threshold: usize,
}

impl TrialQcEvaluator {
    /// Creates an evaluator with the given reaction-time bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBounds` unless both bounds are finite and
    /// `rt_min < rt_max`.
    pub fn new(rt_min: f64, rt_max: f64) -> Result<Self, ConfigError> {
        check_bounds(rt_min, rt_max)?;
        Ok(Self {
            rt_min,
            rt_max,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        })
    }

    /// Creates an evaluator from a pipeline configuration.
    pub fn from_config(config: &QcConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.rt_min, config.rt_max)?
            .with_parallel_threshold(config.parallel_threshold))
    }

    /// Sets the input size at which evaluation runs in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Classifies a single reaction time.
    pub fn classify(&self, reaction_time: Option<f64>) -> QcAnnotation {
        let rt = match reaction_time {
            Some(rt) if !rt.is_nan() => rt,
            _ => return QcAnnotation::invalid(QcReason::MissingRt),
        };

        if rt < 0.0 {
            QcAnnotation::invalid(QcReason::NegativeRt)
        } else if rt < self.rt_min {
            QcAnnotation::invalid(QcReason::RtTooFast)
        } else if rt > self.rt_max {
            QcAnnotation::invalid(QcReason::RtTooSlow)
        } else {
            QcAnnotation::valid()
        }
    }

    /// Annotates a single trial.
    pub fn annotate(&self, record: &TrialRecord) -> AnnotatedTrial {
        AnnotatedTrial::new(record.clone(), self.classify(record.reaction_time))
    }

    /// Annotates every trial. No trial is dropped.
    pub fn evaluate(&self, trials: &[TrialRecord]) -> Vec<AnnotatedTrial> {
        let annotated: Vec<AnnotatedTrial> = if trials.len() >= self.parallel_threshold {
            trials.par_iter().map(|t| self.annotate(t)).collect()
        } else {
            trials.iter().map(|t| self.annotate(t)).collect()
        };

        let rejected = annotated.iter().filter(|t| !t.is_valid()).count();
        debug!(
            total = annotated.len(),
            rejected,
            parallel = trials.len() >= self.parallel_threshold,
            "Trial QC evaluated"
        );

        annotated
    }

    /// Re-annotates already annotated trials from their raw records,
    /// ignoring the previous annotation.
    pub fn reevaluate(&self, trials: &[AnnotatedTrial]) -> Vec<AnnotatedTrial> {
        trials.iter().map(|t| self.annotate(&t.record)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> TrialQcEvaluator {
        TrialQcEvaluator::new(150.0, 1500.0).expect("valid bounds")
    }

    #[test]
    fn test_new_rejects_invalid_bounds() {
        assert!(TrialQcEvaluator::new(1500.0, 150.0).is_err());
        assert!(TrialQcEvaluator::new(150.0, 150.0).is_err());
        assert!(TrialQcEvaluator::new(150.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_classify_rules() {
        let qc = evaluator();
        assert_eq!(qc.classify(None).qc_reason(), Some(QcReason::MissingRt));
        assert_eq!(
            qc.classify(Some(f64::NAN)).qc_reason(),
            Some(QcReason::MissingRt)
        );
        assert_eq!(
            qc.classify(Some(-50.0)).qc_reason(),
            Some(QcReason::NegativeRt)
        );
        assert_eq!(qc.classify(Some(0.0)).qc_reason(), Some(QcReason::RtTooFast));
        assert_eq!(
            qc.classify(Some(149.9)).qc_reason(),
            Some(QcReason::RtTooFast)
        );
        assert_eq!(
            qc.classify(Some(9000.0)).qc_reason(),
            Some(QcReason::RtTooSlow)
        );
        assert_eq!(
            qc.classify(Some(f64::INFINITY)).qc_reason(),
            Some(QcReason::RtTooSlow)
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let qc = evaluator();
        assert!(qc.classify(Some(150.0)).qc_flag());
        assert!(qc.classify(Some(1500.0)).qc_flag());
        assert!(qc.classify(Some(350.0)).qc_flag());
    }

    #[test]
    fn test_negative_takes_precedence_over_too_fast() {
        let qc = evaluator();
        let annotation = qc.classify(Some(-50.0));
        assert!(!annotation.qc_flag());
        assert_eq!(annotation.qc_reason(), Some(QcReason::NegativeRt));
    }

    #[test]
    fn test_evaluate_keeps_every_trial_in_order() {
        let qc = evaluator();
        let trials = vec![
            TrialRecord::new("S01", "visual", 1, 340.0),
            TrialRecord::new("S01", "visual", 2, 9000.0),
            TrialRecord::missing("S02", "auditory", 3),
            TrialRecord::new("S02", "auditory", 4, -50.0),
        ];

        let annotated = qc.evaluate(&trials);
        assert_eq!(annotated.len(), 4);
        let ids: Vec<u64> = annotated.iter().map(|t| t.trial_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(annotated[0].is_valid());
        assert_eq!(
            annotated[1].annotation.qc_reason(),
            Some(QcReason::RtTooSlow)
        );
        assert_eq!(
            annotated[2].annotation.qc_reason(),
            Some(QcReason::MissingRt)
        );
        assert_eq!(
            annotated[3].annotation.qc_reason(),
            Some(QcReason::NegativeRt)
        );
        assert_eq!(annotated[1].record, trials[1]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let trials: Vec<TrialRecord> = (0..500)
            .map(|i| {
                let rt = (i as f64 * 7.3) % 2000.0 - 100.0;
                TrialRecord::new(format!("S{:02}", i % 7), "visual", i, rt)
            })
            .collect();

        let sequential = evaluator().with_parallel_threshold(usize::MAX);
        let parallel = evaluator().with_parallel_threshold(1);
        assert_eq!(sequential.evaluate(&trials), parallel.evaluate(&trials));
    }

    #[test]
    fn test_reevaluate_is_idempotent() {
        let qc = evaluator();
        let trials = vec![
            TrialRecord::new("S01", "visual", 1, 100.0),
            TrialRecord::new("S01", "visual", 2, 400.0),
        ];
        let first = qc.evaluate(&trials);
        let second = qc.reevaluate(&first);
        assert_eq!(first, second);
    }
}
