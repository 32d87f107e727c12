//! Synthetic raw trial generation.
//!
//! Produces reaction-time trials for demos and tests. The generator sits
//! outside the QC pipeline: it only creates input, and every random draw
//! comes from a seeded or injected ChaCha8 RNG so runs are reproducible.
//!
//! # Example
//!
//! ```ignore
//! use trialqc::generator::TrialSimulator;
//!
//! let trials = TrialSimulator::new(42)
//!     .with_sanity_checks()
//!     .generate()?;
//! ```

pub mod simulator;

pub use simulator::{ConditionProfile, SimulationConfig, TrialSimulator};

use crate::error::GeneratorError;

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;
