//! Pipeline orchestrator for QC and aggregation.
//!
//! This module provides the `QcPipeline` that runs the stages in strict order:
//! - Trial-level QC
//! - Subject-level QC
//! - Valid dataset construction
//! - Aggregation
//!
//! Each stage consumes the complete output of the previous one.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{AggregateResult, Aggregator};
use crate::quality::{
    included_subjects, SubjectQcEvaluator, SubjectQcResult, TrialQcEvaluator, ValidDataset,
    ValidDatasetBuilder,
};
use crate::trial::{AnnotatedTrial, TrialRecord};

use super::config::{ConfigError, QcConfig};

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run did not finish before the caller's deadline.
    #[error("Pipeline deadline of {0:?} exceeded; no results produced")]
    DeadlineExceeded(Duration),

    /// The run was stopped before the named stage.
    #[error("Pipeline cancelled before {0}")]
    Cancelled(&'static str),

    /// The blocking worker running the pipeline failed.
    #[error("Pipeline worker failed: {0}")]
    WorkerFailed(String),
}

/// Identity of one pipeline invocation.
///
/// Kept apart from [`PipelineOutput`] so that the same input and
/// configuration always produce an equal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    /// Identifier of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

impl RunMetadata {
    /// Stamps a fresh run id and the current time.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// Every input trial with its QC annotation, in input order.
    pub annotated_trials: Vec<AnnotatedTrial>,
    /// One inclusion decision per subject, sorted by subject.
    pub subject_qc: Vec<SubjectQcResult>,
    /// Trials that were aggregated.
    pub valid_dataset: ValidDataset,
    /// Summary statistics per (subject, condition, statistic).
    pub aggregates: Vec<AggregateResult>,
}

/// The QC-and-aggregation pipeline.
///
/// Only constructible from a validated configuration.
#[derive(Debug, Clone)]
pub struct QcPipeline {
    config: QcConfig,
    trial_qc: TrialQcEvaluator,
    subject_qc: SubjectQcEvaluator,
    aggregator: Aggregator,
}

impl QcPipeline {
    /// Creates a pipeline after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid. No stage runs.
    pub fn new(config: QcConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            trial_qc: TrialQcEvaluator::from_config(&config)?,
            subject_qc: SubjectQcEvaluator::from_config(&config),
            aggregator: Aggregator::from_config(&config)?,
            config,
        })
    }

    /// Creates a pipeline with the default configuration.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::new(QcConfig::default())
    }

    /// The configuration this pipeline was built from.
    pub fn config(&self) -> &QcConfig {
        &self.config
    }

    /// Runs all stages over `trials`.
    ///
    /// The input is only read; QC outcomes are returned as annotations.
    pub fn run(&self, trials: &[TrialRecord]) -> PipelineOutput {
        match self.run_stages(trials, |_| Ok::<(), Infallible>(())) {
            Ok(output) => output,
            Err(never) => match never {},
        }
    }

    /// Runs all stages, stopping before the next stage once `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Cancelled` naming the stage that did not start.
    pub fn run_cancellable(
        &self,
        trials: &[TrialRecord],
        cancel: &AtomicBool,
    ) -> Result<PipelineOutput, PipelineError> {
        self.run_stages(trials, |stage| {
            if cancel.load(Ordering::Relaxed) {
                Err(PipelineError::Cancelled(stage))
            } else {
                Ok(())
            }
        })
    }

    fn run_stages<E>(
        &self,
        trials: &[TrialRecord],
        checkpoint: impl Fn(&'static str) -> Result<(), E>,
    ) -> Result<PipelineOutput, E> {
        let start = Instant::now();
        info!(trials = trials.len(), "Starting QC pipeline");

        checkpoint("trial_qc")?;
        let annotated_trials = self.trial_qc.evaluate(trials);

        checkpoint("subject_qc")?;
        let subject_qc = self.subject_qc.evaluate(&annotated_trials);
        let included = included_subjects(&subject_qc);
        if included.is_empty() && !subject_qc.is_empty() {
            warn!("No subject met the inclusion threshold");
        }

        checkpoint("valid_dataset")?;
        let valid_dataset = ValidDatasetBuilder::build(&annotated_trials, &included);

        checkpoint("aggregation")?;
        let aggregates = self.aggregator.aggregate(&valid_dataset);

        info!(
            valid_trials = valid_dataset.len(),
            aggregate_rows = aggregates.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "QC pipeline complete"
        );

        Ok(PipelineOutput {
            annotated_trials,
            subject_qc,
            valid_dataset,
            aggregates,
        })
    }

    /// Runs the pipeline on a blocking worker, bounded by `deadline`.
    ///
    /// Either the complete output is returned or none of it is. On expiry the
    /// worker is told to stop and does not start another stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::DeadlineExceeded` if the run does not finish in
    /// time, or `PipelineError::WorkerFailed` if the worker panics.
    pub async fn run_with_deadline(
        &self,
        trials: Vec<TrialRecord>,
        deadline: Duration,
    ) -> Result<PipelineOutput, PipelineError> {
        let pipeline = self.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let worker = tokio::task::spawn_blocking(move || {
            pipeline.run_cancellable(&trials, &worker_cancel)
        });

        match tokio::time::timeout(deadline, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::WorkerFailed(e.to_string())),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(?deadline, "QC pipeline deadline exceeded");
                Err(PipelineError::DeadlineExceeded(deadline))
            }
        }
    }
}
