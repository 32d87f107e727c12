//! Audit report for a pipeline run.
//!
//! Summarizes what QC did: the raw reaction-time distribution, how many
//! trials were flagged and why, which subjects were kept, and the final
//! aggregates. The report only reads a [`PipelineOutput`].

mod summary;

pub use summary::{QcReport, RejectedTrial, RtSummary};

use crate::pipeline::PipelineOutput;

impl PipelineOutput {
    /// Builds the audit report for this output.
    pub fn report(&self) -> QcReport {
        QcReport::build(self)
    }
}
