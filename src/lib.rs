//! trialqc: Quality control and aggregation for reaction-time experiments.
//!
//! This library flags invalid trials, excludes subjects with too few valid
//! trials, builds the valid dataset, and aggregates it into per-subject,
//! per-condition statistics.

// Core modules
pub mod aggregate;
pub mod cli;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod trial;

// Re-export commonly used types
pub use aggregate::{AggregateResult, StatisticKind};
pub use error::{DataError, GeneratorError};
pub use pipeline::{
    ConfigError, PipelineError, PipelineOutput, QcConfig, QcPipeline, RunMetadata,
};
pub use trial::{AnnotatedTrial, QcReason, TrialRecord};
