//! Error types for trialqc operations outside the pipeline core.
//!
//! Configuration and pipeline errors live with the pipeline in
//! [`crate::pipeline`]. This module covers:
//! - Synthetic trial generation
//! - Reading and writing trial and result files

use thiserror::Error;

/// Errors that can occur during synthetic trial generation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),
}

/// Errors that can occur while loading or saving data files.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Trial file '{path}' contains duplicate trial id {trial_id}")]
    DuplicateTrialId { path: String, trial_id: u64 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
