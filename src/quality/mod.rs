//! Quality control for trial data.
//!
//! This module provides the three QC stages that run before aggregation:
//!
//! - **Trial QC**: flags each trial valid or rejected with a reason
//! - **Subject QC**: includes subjects with enough valid trials
//! - **Valid dataset**: keeps valid trials of included subjects
//!
//! Nothing is deleted. Every exclusion stays visible through the trial
//! annotations, the subject table, or [`ValidDataset::excluded_by_subject`].

mod subject_qc;
mod trial_qc;
mod valid_dataset;

pub use subject_qc::{included_subjects, SubjectQcEvaluator, SubjectQcResult};
pub use trial_qc::TrialQcEvaluator;
pub use valid_dataset::{ValidDataset, ValidDatasetBuilder};
