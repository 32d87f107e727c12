//! Report types and plain-text rendering.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::aggregate::{AggregateResult, StatisticKind};
use crate::pipeline::{PipelineOutput, RunMetadata};
use crate::quality::SubjectQcResult;
use crate::trial::QcReason;

/// Descriptive statistics of the recorded reaction times.
///
/// Missing values are skipped. Quantiles use linear interpolation and the
/// standard deviation is the sample (n - 1) estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RtSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl RtSummary {
    /// Describes the given values.
    pub fn describe(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = (count > 0).then(|| sorted.iter().sum::<f64>() / count as f64);
        let std = match (mean, count) {
            (Some(m), n) if n > 1 => {
                let ss: f64 = sorted.iter().map(|v| (v - m).powi(2)).sum();
                Some((ss / (n - 1) as f64).sqrt())
            }
            _ => None,
        };

        Self {
            count,
            mean,
            std,
            min: sorted.first().copied(),
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }
}

fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (sorted.len() - 1) as f64 * p;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// A trial that failed trial-level QC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedTrial {
    pub subject: String,
    pub condition: String,
    pub trial_id: u64,
    pub reaction_time: Option<f64>,
    pub reason: QcReason,
}

/// Audit summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct QcReport {
    /// The invocation this report belongs to, when the caller recorded one.
    #[serde(flatten)]
    pub run: Option<RunMetadata>,
    /// Distribution of recorded reaction times before QC.
    pub raw_rt: RtSummary,
    pub total_trials: usize,
    pub valid_trials: usize,
    pub invalid_trials: usize,
    /// Rejections per reason; every reason is listed, including zeros.
    pub reason_counts: BTreeMap<QcReason, usize>,
    pub rejected: Vec<RejectedTrial>,
    pub subject_qc: Vec<SubjectQcResult>,
    pub valid_dataset_size: usize,
    /// Trial-valid trials dropped with their excluded subject.
    pub excluded_by_subject: usize,
    pub aggregates: Vec<AggregateResult>,
}

impl QcReport {
    /// Builds the report from a pipeline output.
    pub fn build(output: &PipelineOutput) -> Self {
        let raw: Vec<f64> = output
            .annotated_trials
            .iter()
            .filter_map(|t| t.record.rt())
            .collect();

        let mut reason_counts: BTreeMap<QcReason, usize> =
            QcReason::ALL.iter().map(|&r| (r, 0)).collect();
        let mut rejected = Vec::new();

        for trial in &output.annotated_trials {
            if let Some(reason) = trial.annotation.qc_reason() {
                *reason_counts.entry(reason).or_insert(0) += 1;
                rejected.push(RejectedTrial {
                    subject: trial.record.subject.clone(),
                    condition: trial.record.condition.clone(),
                    trial_id: trial.record.trial_id,
                    reaction_time: trial.record.reaction_time,
                    reason,
                });
            }
        }

        let total_trials = output.annotated_trials.len();
        let invalid_trials = rejected.len();

        Self {
            run: None,
            raw_rt: RtSummary::describe(&raw),
            total_trials,
            valid_trials: total_trials - invalid_trials,
            invalid_trials,
            reason_counts,
            rejected,
            subject_qc: output.subject_qc.clone(),
            valid_dataset_size: output.valid_dataset.len(),
            excluded_by_subject: output.valid_dataset.excluded_by_subject().len(),
            aggregates: output.aggregates.clone(),
        }
    }

    /// Attaches the run metadata shown in the report header.
    pub fn with_run(mut self, run: RunMetadata) -> Self {
        self.run = Some(run);
        self
    }

    /// Aggregate rows for one statistic.
    pub fn aggregates_for(&self, kind: StatisticKind) -> impl Iterator<Item = &AggregateResult> {
        self.aggregates.iter().filter(move |r| r.statistic == kind)
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for QcReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.run {
            Some(run) => writeln!(
                f,
                "RAW DATA SUMMARY (run {}, started {}):",
                run.run_id,
                run.started_at.to_rfc3339()
            )?,
            None => writeln!(f, "RAW DATA SUMMARY:")?,
        }
        writeln!(f, "  {:<8} {}", "count", self.raw_rt.count)?;
        for (label, value) in [
            ("mean", self.raw_rt.mean),
            ("std", self.raw_rt.std),
            ("min", self.raw_rt.min),
            ("25%", self.raw_rt.q25),
            ("50%", self.raw_rt.median),
            ("75%", self.raw_rt.q75),
            ("max", self.raw_rt.max),
        ] {
            writeln!(f, "  {:<8} {}", label, fmt_opt(value))?;
        }

        writeln!(f)?;
        writeln!(f, "TRIAL QC FLAG COUNTS:")?;
        writeln!(f, "  {:<8} {}", "valid", self.valid_trials)?;
        writeln!(f, "  {:<8} {}", "invalid", self.invalid_trials)?;
        for (reason, count) in &self.reason_counts {
            writeln!(f, "  {:<12} {}", reason.as_str(), count)?;
        }

        writeln!(f)?;
        writeln!(f, "TRIAL QC REJECTED TRIALS:")?;
        if self.rejected.is_empty() {
            writeln!(f, "  (none)")?;
        } else {
            writeln!(
                f,
                "  {:<10} {:<10} {:>7} {:>12}  reason",
                "subject", "condition", "trial", "rt"
            )?;
            for r in &self.rejected {
                writeln!(
                    f,
                    "  {:<10} {:<10} {:>7} {:>12}  {}",
                    r.subject,
                    r.condition,
                    r.trial_id,
                    fmt_opt(r.reaction_time),
                    r.reason
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "SUBJECT-LEVEL QC:")?;
        writeln!(f, "  {:<10} {:>14}  included", "subject", "n_valid_trials")?;
        for s in &self.subject_qc {
            writeln!(
                f,
                "  {:<10} {:>14}  {}",
                s.subject, s.n_valid_trials, s.included
            )?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "FINAL DATASET SIZE: {} ({} valid trials dropped with excluded subjects)",
            self.valid_dataset_size, self.excluded_by_subject
        )?;

        for kind in [
            StatisticKind::Median,
            StatisticKind::Mean,
            StatisticKind::TrimmedMean,
        ] {
            let mut rows = self.aggregates_for(kind).peekable();
            if rows.peek().is_none() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "AGGREGATED RESULTS ({}):", kind.as_str().to_uppercase())?;
            writeln!(
                f,
                "  {:<10} {:<10} {:>12} {:>8}",
                "subject",
                "condition",
                kind.as_str(),
                "n"
            )?;
            for r in rows {
                writeln!(
                    f,
                    "  {:<10} {:<10} {:>12} {:>8}",
                    r.subject,
                    r.condition,
                    fmt_opt(r.value),
                    r.n_trials
                )?;
            }
        }

        Ok(())
    }
}
