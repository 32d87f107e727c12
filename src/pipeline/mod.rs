//! Pipeline orchestration for trial QC and aggregation.
//!
//! # Architecture
//!
//! - **Config**: thresholds and statistics, validated before anything runs
//! - **Orchestrator**: runs the stages in order and collects their outputs
//!
//! # Pipeline Flow
//!
//! 1. **Trial QC**: every trial is flagged valid or given a rejection reason
//! 2. **Subject QC**: subjects with too few valid trials are excluded
//! 3. **Valid dataset**: valid trials of included subjects are kept
//! 4. **Aggregation**: statistics per (subject, condition) over the valid dataset
//!
//! # Example
//!
//! ```rust,ignore
//! use trialqc::pipeline::{QcConfig, QcPipeline};
//! use trialqc::aggregate::StatisticKind;
//!
//! let config = QcConfig::new()
//!     .with_rt_bounds(150.0, 1500.0)
//!     .with_min_valid_trials(10)
//!     .with_statistics([StatisticKind::Median, StatisticKind::TrimmedMean])
//!     .with_trim_fraction(0.1);
//!
//! let pipeline = QcPipeline::new(config)?;
//! let output = pipeline.run(&trials);
//!
//! for row in &output.aggregates {
//!     println!("{} {} {}: {:?}", row.subject, row.condition, row.statistic, row.value);
//! }
//! ```
//!
//! # Deadlines
//!
//! `run_with_deadline` runs the same stages on a blocking worker and returns
//! `PipelineError::DeadlineExceeded` without any partial output if the
//! deadline passes first. The worker is then signalled to stop and does not
//! start another stage.

pub mod config;
pub mod orchestrator;

// Re-export main types for convenience
pub use config::{ConfigError, QcConfig};
pub use orchestrator::{PipelineError, PipelineOutput, QcPipeline, RunMetadata};
